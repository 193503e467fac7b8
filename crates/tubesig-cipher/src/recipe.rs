//! Executable descrambling recipe.

use tubesig_core::Result;

use crate::fragment;
use crate::locator::Descrambler;

/// Source fragments needed to run the descrambler once.
///
/// Built fresh for every attempt from the script it was located in; never
/// reuse one across script versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherRecipe {
    pub function_name: String,
    pub helper_name: Option<String>,
    /// `var name=function(a){...};`
    pub function_source: String,
    /// `var helper={...};`, or empty.
    pub helper_source: String,
}

impl CipherRecipe {
    /// Extract the fragments named by `descrambler` from `script`.
    pub fn build(script: &str, descrambler: &Descrambler) -> Result<Self> {
        let function_source = fragment::extract_function(script, &descrambler.function)?;
        let helper_source = match &descrambler.helper {
            Some(helper) => fragment::extract_object(script, helper)?,
            None => String::new(),
        };

        Ok(Self {
            function_name: descrambler.function.clone(),
            helper_name: descrambler.helper.clone(),
            function_source,
            helper_source,
        })
    }

    pub fn has_helper(&self) -> bool {
        !self.helper_source.is_empty()
    }

    /// `name("signature")`, with the signature quoted as a string literal.
    pub fn call_expression(&self, signature: &str) -> Result<String> {
        let literal = serde_json::to_string(signature)?;
        Ok(format!("{}({literal})", self.function_name))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::locator;

    const PLAYER: &str = r#"var Xy={rv:function(a){a.reverse()},sw:function(a,b){var c=a[0];a[0]=a[b%a.length];a[b%a.length]=c}};
        var other=1;Ab=function(a){a=a.split("");Xy.rv(a,3);Xy.sw(a,1);return a.join("")};"#;

    #[test]
    fn test_build_with_helper() {
        let descrambler = locator::locate(PLAYER).unwrap();
        let recipe = CipherRecipe::build(PLAYER, &descrambler).unwrap();

        assert_eq!(recipe.function_name, "Ab");
        assert_eq!(recipe.helper_name.as_deref(), Some("Xy"));
        assert!(recipe.function_source.starts_with("var Ab=function(a){"));
        assert!(recipe.function_source.ends_with(r#"return a.join("")};"#));
        assert!(recipe.helper_source.starts_with("var Xy={rv:"));
        assert!(recipe.has_helper());
    }

    #[test]
    fn test_build_without_helper() {
        let descrambler = Descrambler {
            function: "Ab".into(),
            helper: None,
        };
        let recipe = CipherRecipe::build(PLAYER, &descrambler).unwrap();
        assert!(!recipe.has_helper());
        assert!(recipe.helper_source.is_empty());
    }

    #[test]
    fn test_missing_helper_fails() {
        let descrambler = Descrambler {
            function: "Ab".into(),
            helper: Some("Nope".into()),
        };
        let err = CipherRecipe::build(PLAYER, &descrambler).unwrap_err();
        assert!(err.is_descramble_failure());
    }

    #[test]
    fn test_call_expression_quotes_signature() {
        let recipe = CipherRecipe {
            function_name: "Ab".into(),
            helper_name: None,
            function_source: String::new(),
            helper_source: String::new(),
        };
        assert_eq!(recipe.call_expression("AABB").unwrap(), r#"Ab("AABB")"#);
        assert_eq!(
            recipe.call_expression(r#"a"b\c"#).unwrap(),
            r#"Ab("a\"b\\c")"#
        );
    }
}
