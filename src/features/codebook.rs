use serde::{Deserialize, Serialize};

/// Bijection from the distinct addresses of a dataset to `0..k-1`.
///
/// Codes follow the sorted order of the lower-cased addresses, so the same
/// address set always yields the same codes regardless of row order. An absent
/// address (contract deployment recipient) is keyed as the empty string and
/// therefore sorts first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressCodebook {
    addresses: Vec<String>,
}

impl AddressCodebook {
    pub fn fit<'a>(addresses: impl IntoIterator<Item = Option<&'a str>>) -> Self {
        let mut addresses: Vec<String> = addresses.into_iter().map(normalize).collect();
        addresses.sort_unstable();
        addresses.dedup();
        Self { addresses }
    }

    pub fn code(&self, address: Option<&str>) -> Option<usize> {
        self.addresses.binary_search(&normalize(address)).ok()
    }

    /// Code assigned to addresses that were not present at fit time.
    pub fn unseen_code(&self) -> usize {
        self.addresses.len()
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    /// Codebooks deserialized from disk must still be sorted and unique.
    pub fn is_well_formed(&self) -> bool {
        self.addresses.windows(2).all(|w| w[0] < w[1])
    }
}

fn normalize(address: Option<&str>) -> String {
    address.map(|a| a.trim().to_ascii_lowercase()).unwrap_or_default()
}
