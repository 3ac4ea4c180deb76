// history.rs

/// Submitted commands in submission order. Append-only for the session;
/// no dedup and no cap.
#[derive(Debug, Default, Clone)]
pub struct History {
    entries: Vec<String>,
}

impl History {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }
    pub fn push(&mut self, entry: impl Into<String>) {
        self.entries.push(entry.into());
    }
    /// No clamping here: out-of-range is `None` and callers keep the cursor in bounds.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(String::as_str)
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    pub fn entries(&self) -> &[String] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn keeps_duplicates_in_submission_order() {
        let mut history = History::new();
        history.push("a");
        history.push("b");
        history.push("a");
        assert_eq!(history.entries(), &["a", "b", "a"]);
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn get_out_of_range_is_none() {
        let mut history = History::new();
        assert_eq!(history.get(0), None);
        history.push("x");
        assert_eq!(history.get(0), Some("x"));
        assert_eq!(history.get(1), None);
    }
}
