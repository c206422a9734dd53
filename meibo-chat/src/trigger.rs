//! Decides which chat messages get a reply

/// Case-insensitive substring match against a set of trigger tokens.
///
/// Matches mid-word ("summei" triggers on "mei"); an empty token set never
/// triggers.
#[derive(Debug, Clone)]
pub struct TriggerFilter {
    tokens: Vec<String>,
}

impl TriggerFilter {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tokens = tokens
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        Self { tokens }
    }

    pub fn should_respond(&self, text: &str) -> bool {
        if self.tokens.is_empty() {
            return false;
        }
        let text = text.to_lowercase();
        self.tokens.iter().any(|token| text.contains(token.as_str()))
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }
}
