use std::borrow::Cow;
use std::fmt;

/// How a single element query is expressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Plain CSS selector
    Css(String),
    /// Elements matching `css` whose text content contains `text`
    Text { css: String, text: String },
    /// Elements with an ARIA role whose accessible name matches the
    /// case-insensitive pattern `name`
    Role { role: String, name: String },
}

impl Selector {
    pub fn css(css: impl Into<String>) -> Self {
        Selector::Css(css.into())
    }

    pub fn text(css: impl Into<String>, text: impl Into<String>) -> Self {
        Selector::Text {
            css: css.into(),
            text: text.into(),
        }
    }

    pub fn role(role: impl Into<String>, name: impl Into<String>) -> Self {
        Selector::Role {
            role: role.into(),
            name: name.into(),
        }
    }

    /// CSS handed to `querySelectorAll` before any text or name filtering.
    pub fn query(&self) -> Cow<'_, str> {
        match self {
            Selector::Css(css) | Selector::Text { css, .. } => Cow::Borrowed(css),
            Selector::Role { role, .. } => role_query(role),
        }
    }

    pub fn text_filter(&self) -> Option<&str> {
        match self {
            Selector::Text { text, .. } => Some(text),
            _ => None,
        }
    }

    pub fn name_pattern(&self) -> Option<&str> {
        match self {
            Selector::Role { name, .. } => Some(name),
            _ => None,
        }
    }
}

impl From<&str> for Selector {
    fn from(css: &str) -> Self {
        Selector::css(css)
    }
}

impl From<String> for Selector {
    fn from(css: String) -> Self {
        Selector::Css(css)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Css(css) => write!(f, "{}", css),
            Selector::Text { css, text } => write!(f, "{}:has-text('{}')", css, text),
            Selector::Role { role, name } => write!(f, "role={}[name=/{}/i]", role, name),
        }
    }
}

/// Elements carrying `role` either explicitly or through their tag.
pub fn role_query(role: &str) -> Cow<'static, str> {
    match role {
        "button" => Cow::Borrowed(
            "button, [role='button'], input[type='button'], input[type='submit']",
        ),
        "link" => Cow::Borrowed("a[href], [role='link']"),
        "option" => Cow::Borrowed("option, [role='option']"),
        "textbox" => Cow::Borrowed("input:not([type]), input[type='text'], textarea, [role='textbox']"),
        other => Cow::Owned(format!("[role='{}']", other)),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Select(Selector),
    Nth(usize),
}

/// A chain of selections: each `Select` searches inside the previous
/// matches, each `Nth` narrows them to one element.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Target {
    steps: Vec<Step>,
}

impl Target {
    pub fn new(selector: Selector) -> Self {
        Self {
            steps: vec![Step::Select(selector)],
        }
    }

    pub fn then(&self, step: Step) -> Self {
        let mut steps = self.steps.clone();
        steps.push(step);
        Self { steps }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                write!(f, " >> ")?;
            }
            match step {
                Step::Select(selector) => write!(f, "{}", selector)?,
                Step::Nth(index) => write!(f, "nth={}", index)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_display_chains_steps() {
        let target = Target::new(Selector::css(".TripUnitWagon"))
            .then(Step::Nth(2))
            .then(Step::Select(Selector::text("a", "Go to passengers")));
        assert_eq!(
            target.to_string(),
            ".TripUnitWagon >> nth=2 >> a:has-text('Go to passengers')"
        );
    }

    #[test]
    fn test_role_query_covers_implicit_roles() {
        let selector = Selector::role("button", "Знайти|search");
        assert!(selector.query().contains("button"));
        assert!(selector.query().contains("[role='button']"));
        assert_eq!(selector.name_pattern(), Some("Знайти|search"));
        assert_eq!(role_query("tab"), "[role='tab']");
    }

    #[test]
    fn test_text_selector_splits_query_and_filter() {
        let selector = Selector::text("button", "Пошук");
        assert_eq!(selector.query(), "button");
        assert_eq!(selector.text_filter(), Some("Пошук"));
        assert_eq!(Selector::from("#startDate").text_filter(), None);
    }
}
