// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

/// Outcome of applying a selection string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SelectionUpdate {
    /// The selection changed to the contained set.
    Updated(BTreeSet<usize>),
    /// Malformed or out-of-range input; the previous selection is kept.
    Invalid,
    /// Empty input, or input naming the current selection.
    Unchanged,
}

fn token_pattern() -> Option<&'static Regex> {
    static TOKEN: OnceLock<Option<Regex>> = OnceLock::new();
    TOKEN
        .get_or_init(|| Regex::new(r"^\s*(\d+)\s*(?:-\s*(\d+)\s*)?$").ok())
        .as_ref()
}

/// Parse `"0-2,5"` style input into device indices.
///
/// Returns `Ok(None)` for blank input. Descending ranges and indices at or
/// above `device_count` are rejected.
pub fn parse_selection(input: &str, device_count: usize) -> Result<Option<BTreeSet<usize>>, String> {
    if input.trim().is_empty() {
        return Ok(None);
    }
    let pattern = token_pattern().ok_or("selection pattern unavailable")?;

    let mut devices = BTreeSet::new();
    for token in input.split(',') {
        let caps = pattern
            .captures(token)
            .ok_or_else(|| format!("malformed token '{}'", token.trim()))?;
        let start: usize = caps[1]
            .parse()
            .map_err(|_| format!("index out of range in '{}'", token.trim()))?;
        let end: usize = match caps.get(2) {
            Some(m) => m
                .as_str()
                .parse()
                .map_err(|_| format!("index out of range in '{}'", token.trim()))?,
            None => start,
        };
        if end < start {
            return Err(format!("descending range '{}'", token.trim()));
        }
        if end >= device_count {
            return Err(format!("device {end} does not exist"));
        }
        devices.extend(start..=end);
    }
    Ok(Some(devices))
}

/// Set of device indices currently rendered.
#[derive(Debug, Clone)]
pub struct DeviceSelection {
    devices: BTreeSet<usize>,
    device_count: usize,
}

impl DeviceSelection {
    /// Every device selected.
    pub fn all(device_count: usize) -> Self {
        Self {
            devices: (0..device_count).collect(),
            device_count,
        }
    }

    pub fn devices(&self) -> Vec<usize> {
        self.devices.iter().copied().collect()
    }

    pub fn apply(&mut self, input: &str) -> SelectionUpdate {
        match parse_selection(input, self.device_count) {
            Ok(None) => SelectionUpdate::Unchanged,
            Ok(Some(devices)) if devices == self.devices => SelectionUpdate::Unchanged,
            Ok(Some(devices)) => {
                self.devices = devices.clone();
                SelectionUpdate::Updated(devices)
            }
            Err(reason) => {
                tracing::debug!("Rejected device selection '{input}': {reason}");
                SelectionUpdate::Invalid
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[usize]) -> BTreeSet<usize> {
        items.iter().copied().collect()
    }

    #[test]
    fn test_parse_ranges_and_lists() {
        assert_eq!(parse_selection("0-2,5", 8).unwrap(), Some(set(&[0, 1, 2, 5])));
        assert_eq!(parse_selection(" 3 ", 8).unwrap(), Some(set(&[3])));
        assert_eq!(parse_selection("1, 1-1 ,0", 8).unwrap(), Some(set(&[0, 1])));
        assert_eq!(parse_selection("   ", 8).unwrap(), None);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse_selection("abc", 8).is_err());
        assert!(parse_selection("3-1", 8).is_err());
        assert!(parse_selection("0,,1", 8).is_err());
        assert!(parse_selection("8", 8).is_err());
        assert!(parse_selection("-1", 8).is_err());
        assert!(parse_selection("99999999999999999999999", 8).is_err());
    }

    #[test]
    fn test_apply_keeps_previous_on_invalid() {
        let mut selection = DeviceSelection::all(6);
        assert_eq!(
            selection.apply("0-2,5"),
            SelectionUpdate::Updated(set(&[0, 1, 2, 5]))
        );
        assert_eq!(selection.apply("abc"), SelectionUpdate::Invalid);
        assert_eq!(selection.devices(), vec![0, 1, 2, 5]);
        assert_eq!(selection.apply(""), SelectionUpdate::Unchanged);
        assert_eq!(selection.devices(), vec![0, 1, 2, 5]);
        assert_eq!(selection.apply("5,0-2"), SelectionUpdate::Unchanged);
    }
}
