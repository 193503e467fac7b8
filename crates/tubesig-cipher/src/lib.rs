//! # tubesig-cipher
//!
//! Signature descrambling for tubesig.
//!
//! The player script is searched for the descrambling function
//! ([`locator`]), its source and its helper object's source are cut out by
//! brace-balanced scanning ([`fragment`]), and the resulting [`CipherRecipe`]
//! is run in a throwaway script sandbox ([`sandbox`]).

pub mod fragment;
pub mod locator;
pub mod recipe;
pub mod sandbox;

pub use locator::{locate, Descrambler, Matcher};
pub use recipe::CipherRecipe;
pub use sandbox::{QuickJsSandbox, SandboxLimits, ScriptEngine};

use tubesig_core::Result;

/// Build a fresh recipe from `script` and run it on `signature`.
pub fn decipher<E: ScriptEngine + ?Sized>(
    engine: &E,
    script: &str,
    descrambler: &Descrambler,
    signature: &str,
) -> Result<String> {
    let recipe = CipherRecipe::build(script, descrambler)?;
    engine.run(&recipe, signature)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_decipher_end_to_end() {
        let script = r#"var Xy={rv:function(a){a.reverse()},sp:function(a,b){a.splice(0,b)}};
            var Ab=function(a){a=a.split("");Xy.sp(a,1);Xy.rv(a,7);return a.join("")};"#;
        let descrambler = locate(script).unwrap();
        let out = decipher(&QuickJsSandbox::new(), script, &descrambler, "xAABB").unwrap();
        assert_eq!(out, "BBAA");
    }
}
