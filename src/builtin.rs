//! The ruleset program shipped with the crate.
//!
//! A deliberately lexical JavaScript checker implementing the analysis
//! calling convention. It honors a subset of the option catalogue (`undef`,
//! `eqeqeq`, `bitwise`, `plusplus`, `debug`, `esversion`, `maxerr`,
//! `maxparams`, the environment-global switches, and the predefined-globals
//! list) and leaves every other option at its own default. Any other program
//! implementing [`Ruleset`] can be swapped in through the loader seam.

use crate::engine::Issue;
use crate::ruleset::{Ruleset, RulesetFault, RulesetLoadError, RulesetLoader, RulesetOptions};
use regex::Regex;
use std::collections::HashSet;

const DEFAULT_MAXERR: i64 = 50;
const DEFAULT_ESVERSION: i64 = 5;

const KEYWORDS: &[&str] = &[
    "async", "await", "break", "case", "catch", "class", "const", "continue", "debugger",
    "default", "delete", "do", "else", "export", "extends", "false", "finally", "for", "function",
    "get", "if", "import", "in", "instanceof", "let", "new", "null", "of", "return", "set",
    "static", "super", "switch", "this", "throw", "true", "try", "typeof", "var", "void", "while",
    "with", "yield",
];

const BASE_GLOBALS: &[&str] = &[
    "Array", "ArrayBuffer", "Boolean", "Date", "Error", "EvalError", "Function", "Infinity",
    "JSON", "Map", "Math", "NaN", "Number", "Object", "Promise", "RangeError", "ReferenceError",
    "RegExp", "Set", "String", "Symbol", "SyntaxError", "TypeError", "URIError", "WeakMap",
    "WeakSet", "arguments", "decodeURI", "decodeURIComponent", "encodeURI", "encodeURIComponent",
    "eval", "isFinite", "isNaN", "parseFloat", "parseInt", "undefined",
];

const NODE_GLOBALS: &[&str] = &[
    "Buffer", "__dirname", "__filename", "clearImmediate", "clearInterval", "clearTimeout",
    "console", "exports", "global", "module", "process", "require", "setImmediate", "setInterval",
    "setTimeout",
];

const BROWSER_GLOBALS: &[&str] = &[
    "XMLHttpRequest", "addEventListener", "atob", "btoa", "clearInterval", "clearTimeout",
    "document", "fetch", "history", "localStorage", "location", "navigator",
    "removeEventListener", "requestAnimationFrame", "screen", "sessionStorage", "setInterval",
    "setTimeout", "window",
];

const DEVEL_GLOBALS: &[&str] = &["alert", "confirm", "console", "prompt"];

const JQUERY_GLOBALS: &[&str] = &["$", "jQuery"];

const MOCHA_GLOBALS: &[&str] = &[
    "after", "afterEach", "before", "beforeEach", "context", "describe", "it", "setup", "suite",
    "teardown", "test", "xdescribe", "xit",
];

const QUNIT_GLOBALS: &[&str] = &[
    "QUnit", "asyncTest", "deepEqual", "equal", "expect", "notDeepEqual", "notEqual", "notOk",
    "notStrictEqual", "ok", "strictEqual", "test", "throws",
];

const WORKER_GLOBALS: &[&str] = &["importScripts", "onmessage", "postMessage", "self"];

const TYPED_GLOBALS: &[&str] = &[
    "ArrayBuffer", "DataView", "Float32Array", "Float64Array", "Int16Array", "Int32Array",
    "Int8Array", "Uint16Array", "Uint32Array", "Uint8Array", "Uint8ClampedArray",
];

/// Loads the built-in ruleset.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinLoader;

impl RulesetLoader for BuiltinLoader {
    fn load(&self) -> Result<Box<dyn Ruleset>, RulesetLoadError> {
        Ok(Box::new(BuiltinRuleset::new()))
    }
}

/// The built-in lexical JavaScript checker.
pub struct BuiltinRuleset {
    ident: Regex,
    declaration: Regex,
    function: Regex,
    catch_clause: Regex,
    debugger: Regex,
    es6_keyword: Regex,
}

impl BuiltinRuleset {
    pub fn new() -> Self {
        Self {
            ident: Regex::new(r"[A-Za-z_$][A-Za-z0-9_$]*").unwrap(),
            declaration: Regex::new(r"\b(?:var|let|const)\b([^;]*)").unwrap(),
            function: Regex::new(r"\bfunction\s*([A-Za-z_$][A-Za-z0-9_$]*)?\s*\(([^)]*)\)")
                .unwrap(),
            catch_clause: Regex::new(r"\bcatch\s*\(\s*([A-Za-z_$][A-Za-z0-9_$]*)").unwrap(),
            debugger: Regex::new(r"\bdebugger\b").unwrap(),
            es6_keyword: Regex::new(r"\b(let|const)\b").unwrap(),
        }
    }

    /// Names declared anywhere in the file. Declarations are hoisted to file
    /// scope; block scoping is not modeled.
    fn collect_declared(&self, masked: &[String]) -> HashSet<String> {
        let mut declared = HashSet::new();
        for line in masked {
            for caps in self.declaration.captures_iter(line) {
                // `var a = 1, b, c = 2;` declares a, b, and c.
                for segment in caps[1].split(',') {
                    if let Some(m) = self.ident.find(segment.trim_start()) {
                        if m.start() == 0 {
                            declared.insert(m.as_str().to_string());
                        }
                    }
                }
            }
            for caps in self.function.captures_iter(line) {
                if let Some(name) = caps.get(1) {
                    declared.insert(name.as_str().to_string());
                }
                for param in caps[2].split(',') {
                    let param = param.trim();
                    if let Some(m) = self.ident.find(param) {
                        if m.start() == 0 {
                            declared.insert(m.as_str().to_string());
                        }
                    }
                }
            }
            for caps in self.catch_clause.captures_iter(line) {
                declared.insert(caps[1].to_string());
            }
        }
        declared
    }

    fn known_globals(&self, options: &RulesetOptions, predefined: &[String]) -> HashSet<String> {
        let mut globals: HashSet<String> = BASE_GLOBALS.iter().map(|s| s.to_string()).collect();
        let environments: &[(&str, &[&str])] = &[
            ("node", NODE_GLOBALS),
            ("browser", BROWSER_GLOBALS),
            ("devel", DEVEL_GLOBALS),
            ("jquery", JQUERY_GLOBALS),
            ("mocha", MOCHA_GLOBALS),
            ("qunit", QUNIT_GLOBALS),
            ("worker", WORKER_GLOBALS),
            ("typed", TYPED_GLOBALS),
        ];
        for (option, names) in environments {
            if options.bool(option, false) {
                globals.extend(names.iter().map(|s| s.to_string()));
            }
        }
        globals.extend(predefined.iter().cloned());
        globals
    }

    fn check_esversion(
        &self,
        line_no: usize,
        line: &str,
        options: &RulesetOptions,
        issues: &mut Vec<Issue>,
    ) {
        if options.int("esversion", DEFAULT_ESVERSION) >= 6 {
            return;
        }
        for m in self.es6_keyword.find_iter(line) {
            issues.push(Issue::new(
                line_no,
                m.start(),
                &format!("'{}' is available in ES6 (use 'esversion: 6').", m.as_str()),
                "esversion",
            ));
        }
        if let Some(pos) = line.find("=>") {
            issues.push(Issue::new(
                line_no,
                pos,
                "Arrow functions are available in ES6 (use 'esversion: 6').",
                "esversion",
            ));
        }
    }

    fn check_undef(
        &self,
        line_no: usize,
        line: &str,
        declared: &HashSet<String>,
        globals: &HashSet<String>,
        issues: &mut Vec<Issue>,
    ) {
        let bytes = line.as_bytes();
        for m in self.ident.find_iter(line) {
            let name = m.as_str();
            if KEYWORDS.contains(&name) || declared.contains(name) || globals.contains(name) {
                continue;
            }
            // Property access: `obj.name` never reads a global binding.
            if m.start() > 0 && bytes[m.start() - 1] == b'.' {
                continue;
            }
            // Object literal key: `{ name: ... }`.
            let after = line[m.end()..].trim_start();
            if after.starts_with(':') {
                continue;
            }
            issues.push(Issue::new(
                line_no,
                m.start(),
                &format!("'{}' is not defined.", name),
                "undef",
            ));
        }
    }

    fn check_eqeqeq(&self, line_no: usize, line: &str, issues: &mut Vec<Issue>) {
        let bytes = line.as_bytes();
        let mut i = 0;
        while i + 1 < bytes.len() {
            if bytes[i] == b'=' && bytes[i + 1] == b'=' {
                let strict = i + 2 < bytes.len() && bytes[i + 2] == b'=';
                let operator_tail = i > 0 && matches!(bytes[i - 1], b'=' | b'!' | b'<' | b'>');
                if !strict && !operator_tail {
                    issues.push(Issue::new(
                        line_no,
                        i,
                        "Expected '===' and instead saw '=='.",
                        "eqeqeq",
                    ));
                }
                i += if strict { 3 } else { 2 };
                continue;
            }
            if bytes[i] == b'!'
                && bytes[i + 1] == b'='
                && (i + 2 >= bytes.len() || bytes[i + 2] != b'=')
            {
                issues.push(Issue::new(
                    line_no,
                    i,
                    "Expected '!==' and instead saw '!='.",
                    "eqeqeq",
                ));
                i += 2;
                continue;
            }
            i += 1;
        }
    }

    fn check_bitwise(&self, line_no: usize, line: &str, issues: &mut Vec<Issue>) {
        let bytes = line.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            let op = bytes[i];
            match op {
                b'&' | b'|' => {
                    if i + 1 < bytes.len() && bytes[i + 1] == op {
                        // Logical && / || are not bitwise.
                        i += 2;
                        continue;
                    }
                    issues.push(Issue::new(
                        line_no,
                        i,
                        &format!("Unexpected use of '{}'.", op as char),
                        "bitwise",
                    ));
                }
                b'^' | b'~' => {
                    issues.push(Issue::new(
                        line_no,
                        i,
                        &format!("Unexpected use of '{}'.", op as char),
                        "bitwise",
                    ));
                }
                b'<' | b'>' => {
                    if i + 1 < bytes.len() && bytes[i + 1] == op {
                        let shift = if op == b'<' { "<<" } else { ">>" };
                        issues.push(Issue::new(
                            line_no,
                            i,
                            &format!("Unexpected use of '{}'.", shift),
                            "bitwise",
                        ));
                        i += 2;
                        while i < bytes.len() && bytes[i] == op {
                            i += 1;
                        }
                        continue;
                    }
                }
                _ => {}
            }
            i += 1;
        }
    }

    fn check_plusplus(&self, line_no: usize, line: &str, issues: &mut Vec<Issue>) {
        let bytes = line.as_bytes();
        let mut i = 0;
        while i + 1 < bytes.len() {
            if (bytes[i] == b'+' && bytes[i + 1] == b'+')
                || (bytes[i] == b'-' && bytes[i + 1] == b'-')
            {
                issues.push(Issue::new(
                    line_no,
                    i,
                    &format!("Unexpected use of '{}{}'.", bytes[i] as char, bytes[i] as char),
                    "plusplus",
                ));
                i += 2;
                continue;
            }
            i += 1;
        }
    }

    fn check_debugger(&self, line_no: usize, line: &str, issues: &mut Vec<Issue>) {
        for m in self.debugger.find_iter(line) {
            issues.push(Issue::new(
                line_no,
                m.start(),
                "Forgotten 'debugger' statement?",
                "debug",
            ));
        }
    }

    fn check_maxparams(
        &self,
        line_no: usize,
        line: &str,
        max_params: i64,
        issues: &mut Vec<Issue>,
    ) {
        for caps in self.function.captures_iter(line) {
            let count = caps[2]
                .split(',')
                .filter(|p| !p.trim().is_empty())
                .count() as i64;
            if count > max_params {
                let start = caps.get(0).map(|m| m.start()).unwrap_or(0);
                issues.push(Issue::new(
                    line_no,
                    start,
                    &format!("This function has too many parameters. ({})", count),
                    "maxparams",
                ));
            }
        }
    }
}

impl Default for BuiltinRuleset {
    fn default() -> Self {
        Self::new()
    }
}

impl Ruleset for BuiltinRuleset {
    fn run(
        &self,
        source: &str,
        options: &RulesetOptions,
        predefined: &[String],
    ) -> Result<Vec<Issue>, RulesetFault> {
        let masked = mask_source(source);
        let check_undef = options.bool("undef", false);
        let check_eqeqeq = options.bool("eqeqeq", false);
        let check_bitwise = options.bool("bitwise", false);
        let check_plusplus = options.bool("plusplus", false);
        let allow_debugger = options.bool("debug", false);
        let max_params = options.int("maxparams", 0);
        let max_errors = options.int("maxerr", DEFAULT_MAXERR);

        let declared = if check_undef {
            self.collect_declared(&masked)
        } else {
            HashSet::new()
        };
        let globals = self.known_globals(options, predefined);

        let mut issues = Vec::new();
        for (idx, line) in masked.iter().enumerate() {
            let line_no = idx + 1;
            self.check_esversion(line_no, line, options, &mut issues);
            if check_undef {
                self.check_undef(line_no, line, &declared, &globals, &mut issues);
            }
            if check_eqeqeq {
                self.check_eqeqeq(line_no, line, &mut issues);
            }
            if check_bitwise {
                self.check_bitwise(line_no, line, &mut issues);
            }
            if check_plusplus {
                self.check_plusplus(line_no, line, &mut issues);
            }
            if !allow_debugger {
                self.check_debugger(line_no, line, &mut issues);
            }
            if max_params > 0 {
                self.check_maxparams(line_no, line, max_params, &mut issues);
            }
        }

        if max_errors > 0 && issues.len() > max_errors as usize {
            let limit = max_errors as usize;
            let last_line = issues[limit - 1].line;
            issues.truncate(limit);
            issues.push(Issue::new(last_line, 0, "Too many errors.", "maxerr"));
        }
        Ok(issues)
    }
}

/// Replace string-literal and comment contents with spaces, preserving line
/// and column layout so reported positions stay meaningful. Regex literals
/// are not tracked.
fn mask_source(source: &str) -> Vec<String> {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Code,
        Block,
        Single,
        Double,
        Template,
    }

    let mut state = State::Code;
    let mut masked_lines = Vec::new();

    for line in source.lines() {
        // Plain strings do not span lines; templates and block comments do.
        if state == State::Single || state == State::Double {
            state = State::Code;
        }

        let mut masked = String::with_capacity(line.len());
        let mut escaped = false;
        let mut chars = line.chars().peekable();

        while let Some(c) = chars.next() {
            match state {
                State::Code => match c {
                    '/' if chars.peek() == Some(&'/') => {
                        masked.push(' ');
                        for _ in chars.by_ref() {
                            masked.push(' ');
                        }
                    }
                    '/' if chars.peek() == Some(&'*') => {
                        state = State::Block;
                        chars.next();
                        masked.push(' ');
                        masked.push(' ');
                    }
                    '\'' => {
                        state = State::Single;
                        masked.push(' ');
                    }
                    '"' => {
                        state = State::Double;
                        masked.push(' ');
                    }
                    '`' => {
                        state = State::Template;
                        masked.push(' ');
                    }
                    _ => masked.push(c),
                },
                State::Block => {
                    if c == '*' && chars.peek() == Some(&'/') {
                        chars.next();
                        masked.push(' ');
                        masked.push(' ');
                        state = State::Code;
                    } else {
                        masked.push(' ');
                    }
                }
                State::Single | State::Double | State::Template => {
                    masked.push(' ');
                    if escaped {
                        escaped = false;
                    } else if c == '\\' {
                        escaped = true;
                    } else if (c == '\'' && state == State::Single)
                        || (c == '"' && state == State::Double)
                        || (c == '`' && state == State::Template)
                    {
                        state = State::Code;
                    }
                }
            }
        }
        masked_lines.push(masked);
    }
    masked_lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::OptionValue;

    fn run_with(source: &str, set: &[(&'static str, OptionValue)]) -> Vec<Issue> {
        let mut options = RulesetOptions::new();
        for (name, value) in set {
            options.set(name, value.clone());
        }
        BuiltinRuleset::new().run(source, &options, &[]).unwrap()
    }

    #[test]
    fn test_undef_flags_never_declared_identifier() {
        let issues = run_with("x = 2;\n", &[("undef", OptionValue::Bool(true))]);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].line, 1);
        assert_eq!(issues[0].id, "undef");
        assert_eq!(issues[0].reason, "'x' is not defined.");
    }

    #[test]
    fn test_undef_accepts_declared_binding() {
        let issues = run_with(
            "var x = 1;\nx = 2;\n",
            &[
                ("undef", OptionValue::Bool(true)),
                ("esversion", OptionValue::Int(6)),
            ],
        );
        assert!(issues.is_empty(), "unexpected issues: {:?}", issues);
    }

    #[test]
    fn test_undef_hoists_later_declarations() {
        let issues = run_with(
            "total = count;\nvar total;\nvar count = 0;\n",
            &[("undef", OptionValue::Bool(true))],
        );
        assert!(issues.is_empty(), "unexpected issues: {:?}", issues);
    }

    #[test]
    fn test_undef_knows_comma_declarations_and_params() {
        let source = "var a = 1, b, c;\nfunction sum(d, e) { return a + b + c + d + e; }\n";
        let issues = run_with(source, &[("undef", OptionValue::Bool(true))]);
        assert!(issues.is_empty(), "unexpected issues: {:?}", issues);
    }

    #[test]
    fn test_undef_ignores_properties_and_keys() {
        let source = "var obj = { total: 1 };\nobj.missing = 2;\n";
        let issues = run_with(source, &[("undef", OptionValue::Bool(true))]);
        assert!(issues.is_empty(), "unexpected issues: {:?}", issues);
    }

    #[test]
    fn test_undef_respects_environments_and_predef() {
        let source = "require('fs');\ncustomGlobal.init();\n";
        let mut options = RulesetOptions::new();
        options.set("undef", OptionValue::Bool(true));
        options.set("node", OptionValue::Bool(true));
        let ruleset = BuiltinRuleset::new();

        let bare = ruleset.run(source, &options, &[]).unwrap();
        assert_eq!(bare.len(), 1);
        assert_eq!(bare[0].reason, "'customGlobal' is not defined.");

        let with_predef = ruleset
            .run(source, &options, &["customGlobal".to_string()])
            .unwrap();
        assert!(with_predef.is_empty());
    }

    #[test]
    fn test_strings_and_comments_never_trigger() {
        let source = concat!(
            "var s = \"x == 1; debugger\";\n",
            "// mystery == here\n",
            "/* one == two\n",
            "   three == four */\n",
            "var t = 'a != b';\n",
        );
        let issues = run_with(
            source,
            &[
                ("eqeqeq", OptionValue::Bool(true)),
                ("undef", OptionValue::Bool(true)),
            ],
        );
        assert!(issues.is_empty(), "unexpected issues: {:?}", issues);
    }

    #[test]
    fn test_eqeqeq_flags_loose_comparison() {
        let issues = run_with(
            "var ok = a === b;\nvar bad = a == b;\nvar worse = a != b;\n",
            &[("eqeqeq", OptionValue::Bool(true))],
        );
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].line, 2);
        assert_eq!(issues[0].reason, "Expected '===' and instead saw '=='.");
        assert_eq!(issues[1].line, 3);
        assert_eq!(issues[1].reason, "Expected '!==' and instead saw '!='.");
    }

    #[test]
    fn test_bitwise_ignores_logical_operators() {
        let issues = run_with(
            "var a = x && y || z;\nvar b = x & y;\nvar c = x << 2;\n",
            &[("bitwise", OptionValue::Bool(true))],
        );
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].reason, "Unexpected use of '&'.");
        assert_eq!(issues[1].reason, "Unexpected use of '<<'.");
    }

    #[test]
    fn test_plusplus() {
        let issues = run_with(
            "i++;\nj--;\nvar k = a + b;\n",
            &[("plusplus", OptionValue::Bool(true))],
        );
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].reason, "Unexpected use of '++'.");
        assert_eq!(issues[1].reason, "Unexpected use of '--'.");
    }

    #[test]
    fn test_debugger_allowed_when_debug_set() {
        let source = "debugger;\n";
        assert_eq!(run_with(source, &[]).len(), 1);
        assert!(run_with(source, &[("debug", OptionValue::Bool(true))]).is_empty());
    }

    #[test]
    fn test_esversion_gates_modern_syntax() {
        let source = "let x = 1;\nconst y = 2;\n";
        let old = run_with(source, &[("esversion", OptionValue::Int(5))]);
        assert_eq!(old.len(), 2);
        assert_eq!(old[0].id, "esversion");

        let modern = run_with(source, &[("esversion", OptionValue::Int(6))]);
        assert!(modern.is_empty());

        // The ruleset default is ES5.
        assert_eq!(run_with(source, &[]).len(), 2);
    }

    #[test]
    fn test_maxparams() {
        let source = "function f(a, b, c) {}\nfunction g(a) {}\n";
        let issues = run_with(source, &[("maxparams", OptionValue::Int(2))]);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].line, 1);
        assert_eq!(
            issues[0].reason,
            "This function has too many parameters. (3)"
        );
    }

    #[test]
    fn test_maxerr_truncates() {
        let mut source = String::new();
        for _ in 0..10 {
            source.push_str("a == b;\n");
        }
        let issues = run_with(
            &source,
            &[
                ("eqeqeq", OptionValue::Bool(true)),
                ("maxerr", OptionValue::Int(3)),
            ],
        );
        assert_eq!(issues.len(), 4);
        assert_eq!(issues[3].id, "maxerr");
        assert_eq!(issues[3].reason, "Too many errors.");
        assert_eq!(issues[3].line, 3);
    }

    #[test]
    fn test_output_is_deterministic_and_ordered() {
        let source = "x = 1;\ny == 2;\n";
        let opts = &[
            ("undef", OptionValue::Bool(true)),
            ("eqeqeq", OptionValue::Bool(true)),
        ];
        let first = run_with(source, opts);
        let second = run_with(source, opts);
        assert_eq!(first, second);
        let lines: Vec<_> = first.iter().map(|i| i.line).collect();
        assert_eq!(lines, vec![1, 2, 2]);
    }

    #[test]
    fn test_mask_source_preserves_layout() {
        let masked = mask_source("var a = \"==\"; // tail\nplain\n");
        assert_eq!(masked.len(), 2);
        assert_eq!(masked[0].len(), "var a = \"==\"; // tail".len());
        assert!(!masked[0].contains("=="));
        assert!(masked[0].starts_with("var a = "));
        assert_eq!(masked[1], "plain");
    }
}
