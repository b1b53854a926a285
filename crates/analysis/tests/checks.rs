//! Tests for the rule-based checks.

use ccheck_analysis::checks::CheckRegistry;
use ccheck_analysis::errorlogger::{CollectingLogger, Severity};
use ccheck_analysis::settings::Settings;
use ccheck_analysis::tokens::Language;
use ccheck_analysis::analyze;

fn check(code: &str) -> CollectingLogger {
    let settings = Settings::default();
    let mut logger = CollectingLogger::new();
    let analysis = analyze(code, "test.cpp", Language::Cpp, &settings, &mut logger)
        .expect("analysis should succeed");
    CheckRegistry::with_default_checks()
        .run_all(&analysis, &settings, &mut logger)
        .expect("checks should succeed");
    logger
}

fn union_messages(logger: &CollectingLogger) -> Vec<String> {
    logger
        .messages
        .iter()
        .filter(|m| m.id == "UnionZeroInit")
        .map(|m| m.to_string())
        .collect()
}

#[test]
fn union_zero_init_basic() {
    let logger = check(
        "union bad_union_0 {\n\
         \x20 char c;\n\
         \x20 long long i64;\n\
         \x20 void *p;\n\
         };\n\
         \n\
         typedef union {\n\
         \x20 char c;\n\
         \x20 int i;\n\
         } bad_union_1;\n\
         \n\
         void foo(void)\n\
         {\n\
         \x20 union { int i; char c; } good0 = {0};\n\
         \x20 union { int i; char c; } good1 = {};\n\
         \n\
         \x20 union { char c; int i; } bad0 = {0};\n\
         \x20 union bad_union_0 bad1 = {0};\n\
         \x20 bad_union_1 bad2 = {0};\n\
         }",
    );
    let messages = union_messages(&logger);
    assert_eq!(messages.len(), 3, "got: {messages:#?}");
    assert!(messages[0].contains("'bad0'"));
    assert!(messages[0].contains("making i the first member"));
    assert!(messages[1].contains("'bad1'"));
    assert!(messages[1].contains("making i64 the first member"));
    assert!(messages[2].contains("'bad2'"));
    assert!(messages[2].contains("making i the first member"));
    for m in &messages {
        assert!(m.contains("(portability)"));
        assert!(m.contains("favor memset()"));
    }
}

#[test]
fn union_zero_init_array_member() {
    let logger = check(
        "void foo(void) {\n\
         \x20 union { int c; char s8[2]; } u = {0};\n\
         }",
    );
    assert!(union_messages(&logger).is_empty());
}

#[test]
fn union_zero_init_struct_member() {
    let logger = check(
        "void foo(void) {\n\
         \x20 union {\n\
         \x20   int c;\n\
         \x20   struct {\n\
         \x20     char x;\n\
         \x20     struct {\n\
         \x20       char y;\n\
         \x20     } s1;\n\
         \x20   } s0;\n\
         \x20 } u = {0};\n\
         }",
    );
    assert!(union_messages(&logger).is_empty());
}

#[test]
fn union_zero_init_unknown_type() {
    let logger = check(
        "union u {\n\
         \x20 Unknown x;\n\
         };",
    );
    assert!(union_messages(&logger).is_empty());
}

#[test]
fn union_zero_init_bitfields() {
    let logger = check(
        "typedef union Evex {\n\
         \x20 int u32;\n\
         \x20 struct {\n\
         \x20   char mmm:3,\n\
         \x20        b4:1,\n\
         \x20        r4:1,\n\
         \x20        b3:1,\n\
         \x20        x3:1,\n\
         \x20        r3:1;\n\
         \x20 } extended;\n\
         } Evex;\n\
         \n\
         void foo(void) {\n\
         \x20 Evex evex = {0};\n\
         }",
    );
    assert!(union_messages(&logger).is_empty());
}

#[test]
fn union_zero_init_largest_member_flagged() {
    // The §8 scenario: only `c` is zero initialized because the largest
    // member is not first.
    let logger = check(
        "void foo(void) {\n\
         \x20 union { char c; long long i; } u = {0};\n\
         }",
    );
    let messages = union_messages(&logger);
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("'u'"));
    assert!(messages[0].contains("making i the first member"));
    assert_eq!(
        logger
            .messages
            .iter()
            .find(|m| m.id == "UnionZeroInit")
            .unwrap()
            .severity,
        Severity::Portability
    );
}

#[test]
fn registry_lists_default_checks() {
    let registry = CheckRegistry::with_default_checks();
    assert!(registry.names().contains(&"CheckUnionZeroInit"));
}
