//! Outcome domain and pattern membership

/// A single roulette outcome (0-36 on a European wheel).
pub type Outcome = u8;

/// Number of distinct physical outcomes on the wheel.
pub const DOMAIN_SIZE: usize = 37;

/// The 12-number group used by the standard deployment.
pub const GROUP_12: [Outcome; 12] = [2, 4, 5, 6, 12, 16, 21, 24, 27, 28, 34, 35];

/// Alternate 12-number group.
pub const GROUP_12_ALT: [Outcome; 12] = [1, 3, 7, 9, 14, 17, 20, 23, 26, 30, 32, 36];

/// Compact 8-number subset.
pub const GROUP_8: [Outcome; 8] = [2, 5, 12, 16, 21, 27, 28, 34];

/// Fixed set of outcome values acting both as the trend predictor and the
/// win condition. Constant for the lifetime of a run.
#[derive(Debug, Clone)]
pub struct Pattern {
    name: String,
    members: [bool; DOMAIN_SIZE],
    values: Vec<Outcome>,
}

impl Pattern {
    /// Build a pattern from a list of outcome values. Out-of-domain values
    /// are dropped, duplicates collapse.
    pub fn new(name: &str, values: &[Outcome]) -> Self {
        let mut members = [false; DOMAIN_SIZE];
        for &v in values {
            if (v as usize) < DOMAIN_SIZE {
                members[v as usize] = true;
            }
        }
        let values = (0..DOMAIN_SIZE as u8).filter(|&v| members[v as usize]).collect();
        Self {
            name: name.to_string(),
            members,
            values,
        }
    }

    /// Resolve a pattern spec: a built-in name ("group12", "group12alt",
    /// "group8") or a comma-separated list of numbers.
    pub fn from_spec(spec: &str) -> Option<Self> {
        match spec.trim().to_ascii_lowercase().as_str() {
            "group12" => return Some(Self::new("group12", &GROUP_12)),
            "group12alt" => return Some(Self::new("group12alt", &GROUP_12_ALT)),
            "group8" => return Some(Self::new("group8", &GROUP_8)),
            _ => {}
        }

        let mut values = Vec::new();
        for part in spec.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            match part.parse::<Outcome>() {
                Ok(v) if (v as usize) < DOMAIN_SIZE => values.push(v),
                _ => return None,
            }
        }

        if values.is_empty() {
            None
        } else {
            Some(Self::new("custom", &values))
        }
    }

    pub fn contains(&self, outcome: Outcome) -> bool {
        (outcome as usize) < DOMAIN_SIZE && self.members[outcome as usize]
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[Outcome] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
