//! The fixed catalogue of analysis options.
//!
//! Every option the engine understands is declared here, with its store key,
//! value type, and description. The set is fixed at compile time; values for
//! these options come from the external option store (see [`crate::store`]).

use std::fmt;
use thiserror::Error;

/// Value type of an option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// `true` / `false`
    Bool,
    /// Signed integer
    Int,
    /// Free-form string
    Str,
}

impl ValueType {
    /// Convert a raw store value to a typed one.
    pub fn parse(self, raw: &str) -> Result<OptionValue, InvalidValue> {
        let trimmed = raw.trim();
        match self {
            ValueType::Bool => match trimmed {
                "true" => Ok(OptionValue::Bool(true)),
                "false" => Ok(OptionValue::Bool(false)),
                _ => Err(InvalidValue {
                    raw: raw.to_string(),
                    expected: self,
                }),
            },
            ValueType::Int => trimmed
                .parse::<i64>()
                .map(OptionValue::Int)
                .map_err(|_| InvalidValue {
                    raw: raw.to_string(),
                    expected: self,
                }),
            ValueType::Str => Ok(OptionValue::Str(raw.to_string())),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Bool => write!(f, "bool"),
            ValueType::Int => write!(f, "int"),
            ValueType::Str => write!(f, "string"),
        }
    }
}

/// A raw value failed conversion to the option's declared type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("`{raw}` is not a valid {expected} value")]
pub struct InvalidValue {
    /// The raw value as read from the store.
    pub raw: String,
    /// The type the option declares.
    pub expected: ValueType,
}

/// A typed option value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(v) => write!(f, "{}", v),
            OptionValue::Int(v) => write!(f, "{}", v),
            OptionValue::Str(v) => write!(f, "{}", v),
        }
    }
}

macro_rules! catalogue {
    ($($variant:ident => $name:literal, $ty:ident, $desc:literal;)+) => {
        /// One entry in the option catalogue.
        ///
        /// Options are never created or destroyed at runtime; the enum is the
        /// whole set.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Opt {
            $($variant,)+
        }

        impl Opt {
            /// Every option, in stable declaration order.
            pub fn all() -> &'static [Opt] {
                const ALL: &[Opt] = &[$(Opt::$variant,)+];
                ALL
            }

            /// Lowercase identifier, also the key in the option store.
            pub fn name(self) -> &'static str {
                match self {
                    $(Opt::$variant => $name,)+
                }
            }

            /// What type the value of this option has.
            pub fn value_type(self) -> ValueType {
                match self {
                    $(Opt::$variant => ValueType::$ty,)+
                }
            }

            /// What this option affects.
            pub fn description(self) -> &'static str {
                match self {
                    $(Opt::$variant => $desc,)+
                }
            }
        }
    };
}

catalogue! {
    // Enforcing options
    Bitwise => "bitwise", Bool, "Prohibit bitwise operators (&, |, ^, etc.)";
    Curly => "curly", Bool, "Require {} for every new block or scope";
    Eqeqeq => "eqeqeq", Bool, "Require triple equals (===) for comparison";
    Forin => "forin", Bool, "Require filtering for..in loops with obj.hasOwnProperty()";
    Freeze => "freeze", Bool, "Prohibit overwriting prototypes of native objects such as Array, Date";
    Funcscope => "funcscope", Bool, "Tolerate defining variables inside control statements";
    Iterator => "iterator", Bool, "Tolerate using the `__iterator__` property";
    Latedef => "latedef", Bool, "Require variables/functions to be defined before being used";
    Noarg => "noarg", Bool, "Prohibit use of `arguments.caller` and `arguments.callee`";
    Nocomma => "nocomma", Bool, "Prohibit use of the comma operator";
    Nonbsp => "nonbsp", Bool, "Prohibit non-breaking whitespace characters";
    Nonew => "nonew", Bool, "Prohibit use of constructors for side-effects (without assignment)";
    Notypeof => "notypeof", Bool, "Tolerate invalid typeof operator values";
    Shadow => "shadow", Bool, "Allow re-defining variables later in code, e.g. `var x=1; x=2;`";
    Strict => "strict", Bool, "Require all functions to run in ES5 strict mode";
    Undef => "undef", Bool, "Require all non-global variables to be declared (prevents global leaks)";
    Unused => "unused", Bool, "Prohibit variables that are defined but never used";
    Varstmt => "varstmt", Bool, "Disallow any var statements; only `let` and `const` are allowed";

    // Relaxing options
    Asi => "asi", Bool, "Tolerate automatic semicolon insertion (no semicolons)";
    Boss => "boss", Bool, "Tolerate assignments where comparisons would be expected";
    Debug => "debug", Bool, "Allow debugger statements, e.g. browser breakpoints";
    Eqnull => "eqnull", Bool, "Tolerate use of `== null`";
    Evil => "evil", Bool, "Tolerate use of `eval` and `new Function()`";
    Expr => "expr", Bool, "Tolerate expression statements as programs";
    Lastsemic => "lastsemic", Bool, "Tolerate omitting a semicolon for the last statement of a one-line block";
    Loopfunc => "loopfunc", Bool, "Tolerate functions being defined in loops";
    Moz => "moz", Bool, "Allow Mozilla-specific syntax (extends and overrides esnext features)";
    Noyield => "noyield", Bool, "Tolerate generator functions with no yield statement";
    Plusplus => "plusplus", Bool, "Prohibit use of `++` and `--`";
    Proto => "proto", Bool, "Tolerate using the `__proto__` property";
    Scripturl => "scripturl", Bool, "Tolerate script-targeted URLs";
    Supernew => "supernew", Bool, "Tolerate `new function () { ... };` and `new Object;`";
    Validthis => "validthis", Bool, "Tolerate using `this` in a non-constructor function";
    Withstmt => "withstmt", Bool, "Tolerate use of `with`";

    // Numeric limits and language level
    Esversion => "esversion", Int, "ECMAScript version to which the code must adhere";
    Maxerr => "maxerr", Int, "Maximum number of errors before stopping";
    Maxparams => "maxparams", Int, "Maximum parameters allowed per function";

    // Environments: predefined global sets
    Browser => "browser", Bool, "Predefine standard browser globals";
    Browserify => "browserify", Bool, "Predefine browserify globals (node.js code in the browser)";
    Couch => "couch", Bool, "Predefine CouchDB globals";
    Devel => "devel", Bool, "Predefine browser globals useful in development (console, alert, ...)";
    Dojo => "dojo", Bool, "Predefine Dojo globals";
    Jasmine => "jasmine", Bool, "Predefine Jasmine globals";
    Jquery => "jquery", Bool, "Predefine jQuery globals";
    Mocha => "mocha", Bool, "Predefine Mocha globals";
    Module => "module", Bool, "Predefine ES module globals";
    Mootools => "mootools", Bool, "Predefine MooTools globals";
    Node => "node", Bool, "Predefine Node.js globals";
    Nonstandard => "nonstandard", Bool, "Predefine widely adopted non-standard globals (escape, unescape, ...)";
    Phantom => "phantom", Bool, "Predefine PhantomJS globals";
    Prototypejs => "prototypejs", Bool, "Predefine Prototype and Scriptaculous globals";
    Qunit => "qunit", Bool, "Predefine QUnit globals";
    Rhino => "rhino", Bool, "Predefine Rhino globals";
    Shelljs => "shelljs", Bool, "Predefine ShellJS globals";
    Typed => "typed", Bool, "Predefine globals for typed array constructors";
    Worker => "worker", Bool, "Predefine Web Worker globals";
    Wsh => "wsh", Bool, "Predefine Windows Script Host globals";
    Yui => "yui", Bool, "Predefine Yahoo User Interface globals";

    // Extra predefined globals
    Predef => "predef", Str, "Names of additional predefined global variables (comma-separated)";
}

impl Opt {
    /// Length of the longest option name, for aligned listings.
    pub fn max_name_len() -> usize {
        Opt::all().iter().map(|o| o.name().len()).max().unwrap_or(0)
    }
}

impl fmt::Display for Opt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Opt {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        Opt::all()
            .iter()
            .copied()
            .find(|o| o.name() == lower)
            .ok_or_else(|| format!("Unknown option: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalogue_is_stable_and_unique() {
        let all = Opt::all();
        assert_eq!(all[0], Opt::Bitwise);
        assert_eq!(all[all.len() - 1], Opt::Predef);

        let mut names: Vec<_> = all.iter().map(|o| o.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), all.len());
    }

    #[test]
    fn test_names_are_lowercase() {
        for opt in Opt::all() {
            assert_eq!(opt.name(), opt.name().to_lowercase());
            assert!(!opt.description().is_empty());
        }
    }

    #[test]
    fn test_from_str() {
        assert_eq!("undef".parse::<Opt>().unwrap(), Opt::Undef);
        assert_eq!("ESVERSION".parse::<Opt>().unwrap(), Opt::Esversion);
        assert!("no-such-option".parse::<Opt>().is_err());
    }

    #[test]
    fn test_value_types() {
        assert_eq!(Opt::Undef.value_type(), ValueType::Bool);
        assert_eq!(Opt::Esversion.value_type(), ValueType::Int);
        assert_eq!(Opt::Predef.value_type(), ValueType::Str);
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(
            ValueType::Bool.parse("true").unwrap(),
            OptionValue::Bool(true)
        );
        assert_eq!(
            ValueType::Bool.parse(" false ").unwrap(),
            OptionValue::Bool(false)
        );
        assert!(ValueType::Bool.parse("yes").is_err());
        assert!(ValueType::Bool.parse("1").is_err());
    }

    #[test]
    fn test_parse_int() {
        assert_eq!(ValueType::Int.parse("6").unwrap(), OptionValue::Int(6));
        assert_eq!(ValueType::Int.parse("-1").unwrap(), OptionValue::Int(-1));
        assert!(ValueType::Int.parse("six").is_err());
        assert!(ValueType::Int.parse("1.5").is_err());
    }

    #[test]
    fn test_parse_str_is_verbatim() {
        assert_eq!(
            ValueType::Str.parse(" a, b ").unwrap(),
            OptionValue::Str(" a, b ".to_string())
        );
    }

    #[test]
    fn test_invalid_value_display() {
        let err = ValueType::Int.parse("abc").unwrap_err();
        assert_eq!(format!("{}", err), "`abc` is not a valid int value");
    }

    #[test]
    fn test_max_name_len() {
        assert_eq!(Opt::max_name_len(), "prototypejs".len());
    }
}
