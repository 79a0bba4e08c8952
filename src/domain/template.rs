//! Template engine for served pages
//!
//! Pages contain `%KEY%` tokens. Every registered key is backed by a producer
//! closure that is evaluated at injection time, so a page always shows the
//! node's state at the moment it is served.
//!
//! Substitution is single pass: text produced by a variable is copied to the
//! output as is and never scanned for further tokens. Tokens whose key is not
//! registered are left untouched.

use crate::shared::error::{AppError, AppResult};
use std::collections::HashMap;
use std::fmt;

/// Producer for a template value
pub type Variable = Box<dyn Fn() -> String + Send + Sync>;

/// Named lazy values injected into served pages
#[derive(Default)]
pub struct TemplateVariables {
    variables: HashMap<String, Variable>,
}

impl fmt::Debug for TemplateVariables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&String> = self.variables.keys().collect();
        keys.sort();
        f.debug_struct("TemplateVariables").field("keys", &keys).finish()
    }
}

impl TemplateVariables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a producer for `%key%`, replacing any previous one
    pub fn insert<F>(&mut self, key: impl Into<String>, producer: F) -> AppResult<()>
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        let key = key.into();
        if !Self::is_valid_key(&key) {
            return Err(AppError::Validation(format!("Invalid template key: {:?}", key)));
        }

        self.variables.insert(key, Box::new(producer));
        Ok(())
    }

    /// Register a fixed value
    pub fn insert_value(&mut self, key: impl Into<String>, value: impl Into<String>) -> AppResult<()> {
        let value = value.into();
        self.insert(key, move || value.clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.variables.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Keys are non-empty and limited to ASCII letters, digits and `_`
    pub fn is_valid_key(key: &str) -> bool {
        !key.is_empty() && key.bytes().all(is_key_byte)
    }

    /// Replace every registered `%KEY%` token in `source`
    ///
    /// Each producer runs at most once per call.
    pub fn inject(&self, source: &str) -> String {
        let mut output = String::with_capacity(source.len());
        let mut values: HashMap<&str, String> = HashMap::new();
        let mut rest = source;

        while let Some(start) = rest.find('%') {
            output.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            let key_len = after.bytes().take_while(|byte| is_key_byte(*byte)).count();

            if key_len > 0 && after.as_bytes().get(key_len) == Some(&b'%') {
                let key = &after[..key_len];
                if let Some(producer) = self.variables.get(key) {
                    let value = values.entry(key).or_insert_with(|| producer());
                    output.push_str(value);
                    rest = &after[key_len + 1..];
                    continue;
                }
            }

            // Not a registered token: keep the `%` and rescan from the next
            // character, which may open a token of its own.
            output.push('%');
            rest = after;
        }

        output.push_str(rest);
        output
    }

    /// In-place variant of [`TemplateVariables::inject`]
    pub fn inject_into(&self, source: &mut String) {
        *source = self.inject(source);
    }
}

fn is_key_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}
