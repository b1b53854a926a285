//! End-to-end value-flow scenarios: analyze small translation units and
//! check the facts attached to tokens.

use ccheck_analysis::errorlogger::CollectingLogger;
use ccheck_analysis::settings::Settings;
use ccheck_analysis::tokens::{Language, Token, TokenList};
use ccheck_analysis::values::{Bound, ValueType};
use ccheck_analysis::{analyze, Analysis};

fn run(code: &str) -> (Analysis, CollectingLogger) {
    let settings = Settings::default();
    let mut logger = CollectingLogger::new();
    let analysis = analyze(code, "test.cpp", Language::Cpp, &settings, &mut logger)
        .expect("analysis should succeed");
    (analysis, logger)
}

fn find_nth(list: &TokenList, text: &str, n: usize) -> Token {
    list.tokens()
        .filter(|t| list.text(*t) == text)
        .nth(n)
        .unwrap_or_else(|| panic!("token '{text}' #{n} not found"))
}

fn find(list: &TokenList, text: &str) -> Token {
    find_nth(list, text, 0)
}

#[test]
fn constants_fold_through_expressions() {
    // int x = 10; return 4 * x + 2;
    let (analysis, _) = run("int f() { int x = 10; return 4 * x + 2; }");
    let list = &analysis.tokens;

    let x_use = find_nth(list, "x", 1);
    assert_eq!(list.known_int_value(x_use), Some(10));

    let star = find(list, "*");
    assert_eq!(list.known_int_value(star), Some(40));

    let plus = find(list, "+");
    assert_eq!(list.known_int_value(plus), Some(42));
}

#[test]
fn known_value_survives_untaken_else() {
    let (analysis, _) = run(
        "void g(int); void f() { int a = 10; int b; if (a) { b = 1; } else { b = 2; } g(a); }",
    );
    let list = &analysis.tokens;

    // The condition token itself knows the value, so a checker can see the
    // else branch is unreachable.
    let a_cond = find_nth(list, "a", 1);
    assert_eq!(list.known_int_value(a_cond), Some(10));

    // Skipping the unreachable else does not demote the value.
    let a_after = find_nth(list, "a", 2);
    assert_eq!(list.known_int_value(a_after), Some(10));
}

#[test]
fn comparison_narrows_the_then_branch() {
    let (analysis, _) = run("void f(int x) { if (x < 10) { int y = x; } }");
    let list = &analysis.tokens;

    let x_use = find_nth(list, "x", 2);
    let values = list.values(x_use);
    assert!(
        values
            .iter()
            .any(|v| !v.is_impossible() && v.bound == Bound::Upper && v.int_value == 9),
        "expected a possible <=9 on x, got {values:?}"
    );
    assert!(
        values
            .iter()
            .any(|v| v.is_impossible() && v.bound == Bound::Lower && v.int_value == 10),
        "expected an impossible >=10 on x, got {values:?}"
    );
}

#[test]
fn nonnull_pointer_in_then_branch() {
    let (analysis, _) = run("void f(int *p) { if (p) { *p = 3; } else { p; } }");
    let list = &analysis.tokens;

    // Inside the then branch the pointer is never null.
    let p_then = find_nth(list, "p", 2);
    assert!(
        list.values(p_then)
            .iter()
            .any(|v| v.is_impossible() && v.int_value == 0),
        "expected impossible 0 inside then, got {:?}",
        list.values(p_then)
    );

    // Inside the else branch null is possible.
    let p_else = find_nth(list, "p", 3);
    assert!(
        list.values(p_else)
            .iter()
            .any(|v| !v.is_impossible() && v.int_value == 0),
        "expected possible 0 inside else, got {:?}",
        list.values(p_else)
    );
}

#[test]
fn container_empty_guard() {
    let (analysis, _) = run(
        "void f(std::vector<int> &v) { if (!v.empty()) { int x = v[0]; } }",
    );
    let list = &analysis.tokens;

    // Inside the guarded block the container size is never zero.
    let v_use = find_nth(list, "v", 2);
    assert!(
        list.values(v_use).iter().any(|v| {
            v.value_type == ValueType::ContainerSize && v.is_impossible() && v.int_value == 0
        }),
        "expected impossible container-size 0, got {:?}",
        list.values(v_use)
    );
}

#[test]
fn reassignment_stops_propagation() {
    let (analysis, _) = run("int g(); void f() { int x = 3; x = g(); int y = x; }");
    let list = &analysis.tokens;
    let x_at_y = find_nth(list, "x", 2);
    assert_eq!(list.known_int_value(x_at_y), None);
}

#[test]
fn uninitialized_local_is_tracked() {
    let (analysis, _) = run("void f() { int x; int y = x + 1; }");
    let list = &analysis.tokens;
    let x_use = find_nth(list, "x", 1);
    assert!(
        list.values(x_use)
            .iter()
            .any(|v| v.value_type == ValueType::Uninit),
        "expected an uninit value, got {:?}",
        list.values(x_use)
    );
}

#[test]
fn compound_assignment_updates_value() {
    let (analysis, _) = run("void f() { int x = 10; x += 5; int y = x; }");
    let list = &analysis.tokens;
    let x_at_y = find_nth(list, "x", 2);
    assert!(
        list.values(x_at_y)
            .iter()
            .any(|v| v.is_int_value() && v.int_value == 15),
        "expected 15 after compound assignment, got {:?}",
        list.values(x_at_y)
    );
}

#[test]
fn increment_updates_value() {
    let (analysis, _) = run("void f() { int x = 10; ++x; int y = x; }");
    let list = &analysis.tokens;
    let x_at_y = find_nth(list, "x", 2);
    assert!(
        list.values(x_at_y)
            .iter()
            .any(|v| v.is_int_value() && v.int_value == 11),
        "expected 11 after increment, got {:?}",
        list.values(x_at_y)
    );
}

#[test]
fn argument_values_reach_the_callee() {
    let (analysis, _) = run("void g(int a) { int b = a; } void f() { g(7); }");
    let list = &analysis.tokens;
    let a_use = find_nth(list, "a", 1);
    let values = list.values(a_use);
    assert!(
        values.iter().any(|v| v.int_value == 7 && v.is_possible()),
        "expected possible 7 injected into the callee, got {values:?}"
    );
}

#[test]
fn library_return_value_is_evaluated() {
    let (analysis, _) = run("void f() { int n = strlen(\"abc\"); }");
    let list = &analysis.tokens;
    let call = find_nth(list, "(", 1);
    assert_eq!(list.known_int_value(call), Some(3));
}

#[test]
fn sizeof_pointer_uses_platform_width() {
    let (analysis, _) = run("void f() { int n = sizeof(char *); }");
    let list = &analysis.tokens;
    let open = find_nth(list, "(", 1);
    assert_eq!(list.known_int_value(open), Some(8));
}

#[test]
fn sizeof_array_multiplies_dimensions() {
    let (analysis, _) = run("void f() { int arr[10]; int n = sizeof(arr); }");
    let list = &analysis.tokens;
    let open = find_nth(list, "(", 1);
    assert_eq!(list.known_int_value(open), Some(40));
}

#[test]
fn power_of_two_mask_has_two_values() {
    let (analysis, _) = run("void f(unsigned x) { int y = x & 8; }");
    let list = &analysis.tokens;
    let and = find(list, "&");
    let values = list.values(and);
    assert!(values.iter().any(|v| v.int_value == 0));
    assert!(values.iter().any(|v| v.int_value == 8));
}

#[test]
fn same_expression_folds() {
    let (analysis, _) = run("int f(int a) { return a - a; }");
    let list = &analysis.tokens;
    let minus = find(list, "-");
    assert_eq!(list.known_int_value(minus), Some(0));
}

#[test]
fn right_shift_saturates_to_zero() {
    let (analysis, _) = run("void f(unsigned x) { int y = (x & 7) >> 3; }");
    let list = &analysis.tokens;
    let shift = find(list, ">>");
    assert_eq!(list.known_int_value(shift), Some(0));
}

#[test]
fn moved_variable_is_tracked() {
    let (analysis, _) = run(
        "void f(std::string s) { std::string t = std::move(s); s.size(); }",
    );
    let list = &analysis.tokens;
    let s_after = find_nth(list, "s", 2);
    assert!(
        list.values(s_after)
            .iter()
            .any(|v| v.value_type == ValueType::Moved),
        "expected a moved value, got {:?}",
        list.values(s_after)
    );
}

#[test]
fn iterator_comparison_is_inferred() {
    let (analysis, _) = run("void f(std::vector<int> &v) { v.end() == v.end(); }");
    let list = &analysis.tokens;
    // Both end() calls carry a known end-iterator value, so the comparison
    // folds to a known result.
    let call = find_nth(list, "(", 1);
    assert!(
        list.values(call)
            .iter()
            .any(|v| v.value_type == ValueType::IteratorEnd && v.is_known()),
        "expected a known end-iterator value, got {:?}",
        list.values(call)
    );
    let eq = find(list, "==");
    assert_eq!(list.known_int_value(eq), Some(1));
}

#[test]
fn switch_case_values_propagate_backwards() {
    let (analysis, _) = run("void g(int); void f(int x) { g(x); switch (x) { case 3: break; } }");
    let list = &analysis.tokens;
    let x_before = find_nth(list, "x", 2);
    assert!(
        list.values(x_before)
            .iter()
            .any(|v| v.int_value == 3 && v.condition.is_some()),
        "expected a condition-derived 3 before the switch, got {:?}",
        list.values(x_before)
    );
}

#[test]
fn enum_values_are_seeded() {
    let (analysis, _) = run("enum E { A, B = 10, C }; void f() { int x = C; }");
    let list = &analysis.tokens;
    let c_use = find_nth(list, "C", 1);
    assert_eq!(list.known_int_value(c_use), Some(11));
}

#[test]
fn global_const_is_seeded() {
    let (analysis, _) = run("const int limit = 100; void f() { int x = limit; }");
    let list = &analysis.tokens;
    let use_tok = find_nth(list, "limit", 1);
    assert_eq!(list.known_int_value(use_tok), Some(100));
}

#[test]
fn orchestrator_is_idempotent() {
    let settings = Settings::default();
    let mut logger = CollectingLogger::new();
    let mut analysis = analyze(
        "int f() { int x = 10; if (x < 20) { x += 1; } return x; }",
        "test.cpp",
        Language::Cpp,
        &settings,
        &mut logger,
    )
    .expect("analysis should succeed");
    let first = analysis.tokens.total_values();
    ccheck_analysis::valueflow::set_values(
        &mut analysis.tokens,
        &analysis.symbols,
        &mut logger,
        &settings,
    )
    .expect("second run should succeed");
    assert_eq!(analysis.tokens.total_values(), first);
}

#[test]
fn bailouts_are_debug_only() {
    let settings = Settings::with_debug_warnings();
    let mut logger = CollectingLogger::new();
    // Taking the address of the variable is a classic bailout.
    analyze(
        "void g(int *); void f() { int x = 1; g(&x); int y = x; }",
        "test.cpp",
        Language::Cpp,
        &settings,
        &mut logger,
    )
    .expect("analysis should succeed");
    for msg in &logger.messages {
        if msg.id.starts_with("valueFlowBailout") {
            assert_eq!(msg.severity, ccheck_analysis::errorlogger::Severity::Debug);
        }
    }
}

#[test]
fn malformed_input_is_an_error_not_a_panic() {
    let settings = Settings::default();
    let mut logger = CollectingLogger::new();
    let result = analyze(
        "void f() { if (x { }",
        "test.cpp",
        Language::Cpp,
        &settings,
        &mut logger,
    );
    assert!(result.is_err());
}

#[test]
fn value_cap_is_enforced() {
    // Many distinct possible values: the list stays within the cap.
    let (analysis, _) = run(
        "void f(int c) { int x = 0; switch (c) { case 100: break; case 200: break; \
         case 300: break; case 400: break; case 500: break; case 600: break; \
         case 700: break; case 800: break; case 900: break; case 1000: break; \
         case 1100: break; case 1200: break; } x = c; }",
    );
    let list = &analysis.tokens;
    for tok in list.tokens() {
        assert!(list.values(tok).len() <= 10, "value list over the cap");
    }
}
