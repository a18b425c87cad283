/// How a caller names a variable of the nested model.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum VariableSpec {
    /// A qualified or promoted name, exposed under the same name.
    Literal(String),
    /// A qualified or promoted name, exposed under `alias`.
    Alias { source: String, alias: String },
    /// A glob matched against promoted names.
    Pattern(String),
}

impl VariableSpec {
    pub fn literal(name: impl Into<String>) -> Self {
        Self::Literal(name.into())
    }

    pub fn alias(source: impl Into<String>, alias: impl Into<String>) -> Self {
        Self::Alias {
            source: source.into(),
            alias: alias.into(),
        }
    }

    pub fn pattern(glob: impl Into<String>) -> Self {
        Self::Pattern(glob.into())
    }

    /// Parses a bare name, treating any glob character as a pattern.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        if has_glob_chars(text) {
            Self::pattern(text)
        } else {
            Self::literal(text)
        }
    }
}

impl From<&str> for VariableSpec {
    fn from(text: &str) -> Self {
        Self::parse(text)
    }
}

impl From<String> for VariableSpec {
    fn from(text: String) -> Self {
        Self::parse(&text)
    }
}

impl From<(&str, &str)> for VariableSpec {
    fn from((source, alias): (&str, &str)) -> Self {
        Self::alias(source, alias)
    }
}

/// Returns `true` if `text` contains a glob metacharacter.
pub(crate) fn has_glob_chars(text: &str) -> bool {
    text.contains(['*', '?', '['])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_detects_globs() {
        assert_eq!(VariableSpec::from("x"), VariableSpec::literal("x"));
        assert_eq!(VariableSpec::from("g*.x"), VariableSpec::pattern("g*.x"));
        assert_eq!(VariableSpec::from("x?"), VariableSpec::pattern("x?"));
        assert_eq!(VariableSpec::from("[ab]"), VariableSpec::pattern("[ab]"));
    }

    #[test]
    fn tuples_become_aliases() {
        assert_eq!(
            VariableSpec::from(("g1.x", "xa")),
            VariableSpec::Alias {
                source: "g1.x".into(),
                alias: "xa".into()
            }
        );
    }
}
