use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::BlockNumber;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DelegateType {
    Dao,
    Guardian,
}

impl DelegateType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dao => "DAO",
            Self::Guardian => "GUARDIAN",
        }
    }
}

/// Inclusive block window; an absent end means the window is still open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegateWindow {
    pub start_block: BlockNumber,
    pub end_block: Option<BlockNumber>,
}

impl DelegateWindow {
    pub fn new(start_block: BlockNumber, end_block: Option<BlockNumber>) -> Self {
        Self {
            start_block,
            end_block,
        }
    }

    pub fn contains(&self, block: BlockNumber) -> bool {
        block >= self.start_block && self.end_block.is_none_or(|end| block <= end)
    }

    pub fn is_within(&self, outer: &DelegateWindow) -> bool {
        if self.start_block < outer.start_block {
            return false;
        }
        match (self.end_block, outer.end_block) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(inner), Some(outer)) => inner <= outer,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegate {
    pub address: String,
    #[serde(rename = "type")]
    pub delegate_type: DelegateType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub start_block: BlockNumber,
    #[serde(default)]
    pub end_block: Option<BlockNumber>,
}

impl Delegate {
    pub fn window(&self) -> DelegateWindow {
        DelegateWindow::new(self.start_block, self.end_block)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cohort {
    pub index: u32,
    pub network: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub start_block: BlockNumber,
    #[serde(default)]
    pub end_block: Option<BlockNumber>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tracks: Vec<String>,
    #[serde(default)]
    pub delegates: Vec<Delegate>,
}

impl Cohort {
    pub fn is_ongoing(&self) -> bool {
        self.end_block.is_none()
    }

    pub fn window(&self) -> DelegateWindow {
        DelegateWindow::new(self.start_block, self.end_block)
    }

    pub fn network(&self) -> String {
        normalize_network(&self.network)
    }

    pub fn delegate_addresses(&self) -> Vec<String> {
        let mut addresses = self
            .delegates
            .iter()
            .map(|delegate| delegate.address.trim().to_owned())
            .filter(|address| !address.is_empty())
            .collect::<Vec<_>>();
        addresses.sort();
        addresses.dedup();
        addresses
    }

    pub fn delegate(&self, address: &str) -> Option<&Delegate> {
        let address = address.trim();
        self.delegates
            .iter()
            .find(|delegate| delegate.address.trim() == address)
    }
}

pub fn normalize_network(network: &str) -> String {
    network.trim().to_ascii_lowercase()
}
