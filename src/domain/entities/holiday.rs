//! Holiday entity module
//!
//! A Holiday is a calendar date observed by the job generator's holiday
//! policy (SPEC_FULL.md §4.C7).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Holiday {
    pub date: NaiveDate,
    pub name: String,
    pub is_custom: bool,
}

impl Holiday {
    pub fn new(date: NaiveDate, name: String, is_custom: bool) -> Self {
        Self {
            date,
            name,
            is_custom,
        }
    }
}
