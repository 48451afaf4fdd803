//! Property expansion for strings
//!
//! Rewrites `${name}` references against a [`PropertyStore`]. Values that
//! themselves contain references are expanded recursively while the keys on
//! the current chain are tracked, so a cycle always ends in an error instead
//! of looping.
//!
//! Escapes follow the classic build-tool rules:
//! - `$$` renders a single `$`
//! - `$` followed by anything other than `{` or `$` is kept literally
//! - a `${` without a closing `}` is an error

use crate::error::{ExpansionError, ExpansionResult};
use crate::properties::PropertyStore;

/// Expands `${name}` references
///
/// In lenient mode (the default) an undefined property keeps its literal
/// `${name}` text. In strict mode it is an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Expander {
    strict: bool,
}

impl Expander {
    /// Lenient expander
    pub fn new() -> Self {
        Self::default()
    }

    /// Expander that rejects undefined properties
    pub fn strict() -> Self {
        Expander { strict: true }
    }

    /// Set strict mode
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Whether undefined properties are errors
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Expand every reference in `input`
    pub fn expand(&self, input: &str, store: &PropertyStore) -> ExpansionResult<String> {
        let mut chain = Vec::new();
        self.expand_with(input, store, &mut chain)
    }

    /// Expand `input` with `chain` holding the keys currently being expanded
    ///
    /// A key is pushed before its value is expanded and popped afterwards, so
    /// on return `chain` is as it was passed in.
    pub fn expand_with(
        &self,
        input: &str,
        store: &PropertyStore,
        chain: &mut Vec<String>,
    ) -> ExpansionResult<String> {
        let mut out = String::with_capacity(input.len());
        let mut rest = input;

        while let Some(pos) = rest.find('$') {
            out.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];

            match after.as_bytes().first() {
                Some(b'$') => {
                    out.push('$');
                    rest = &after[1..];
                }
                Some(b'{') => {
                    let end = after
                        .find('}')
                        .ok_or_else(|| ExpansionError::Unterminated(input.to_string()))?;
                    let name = &after[1..end];
                    out.push_str(&self.resolve(name, store, chain)?);
                    rest = &after[end + 1..];
                }
                _ => {
                    out.push('$');
                    rest = after;
                }
            }
        }

        out.push_str(rest);
        Ok(out)
    }

    fn resolve(
        &self,
        name: &str,
        store: &PropertyStore,
        chain: &mut Vec<String>,
    ) -> ExpansionResult<String> {
        if chain.iter().any(|k| k == name) {
            return Err(ExpansionError::Circular(name.to_string()));
        }

        match store.get(name) {
            Some(value) => {
                chain.push(name.to_string());
                let expanded = self.expand_with(&value, store, chain);
                chain.pop();
                expanded
            }
            None if self.strict => Err(ExpansionError::Undefined(name.to_string())),
            None => Ok(format!("${{{}}}", name)),
        }
    }
}

/// Expand leniently, leaving undefined references as written
pub fn expand(input: &str, store: &PropertyStore) -> ExpansionResult<String> {
    Expander::new().expand(input, store)
}

/// Expand strictly, failing on the first undefined reference
pub fn expand_strict(input: &str, store: &PropertyStore) -> ExpansionResult<String> {
    Expander::strict().expand(input, store)
}
