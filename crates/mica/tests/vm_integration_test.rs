mod common;

use common::{assert_dual, assert_output, run_err};

#[test]
fn arithmetic_and_globals() {
    assert_dual("let x = 1 + 2\nprint x", &["3"]);
    assert_dual("print 7 / 2", &["3.5"]);
    assert_dual("print 10 % 3", &["1"]);
    assert_dual("print 2 * 3 - 4", &["2"]);
    assert_dual("print -(1 + 2)", &["-3"]);
}

#[test]
fn number_display_trims_integral_values() {
    assert_dual("print 4 / 2", &["2"]);
    assert_dual("print 0.5 + 0.25", &["0.75"]);
}

#[test]
fn string_concatenation_stringifies_either_side() {
    assert_dual("print \"n=\" + 2", &["n=2"]);
    assert_dual("print 1 + \"!\"", &["1!"]);
    assert_dual("print \"a\" + \"b\"", &["ab"]);
}

#[test]
fn equality_and_comparison() {
    assert_dual("print 1 == 1", &["true"]);
    assert_dual("print 1 != 2", &["true"]);
    assert_dual("print nil == false", &["false"]);
    assert_dual("print 2 >= 2", &["true"]);
    assert_dual("print 2 <= 1", &["false"]);
    assert_dual("print \"a\" == \"a\"", &["true"]);
}

#[test]
fn logical_operators_short_circuit_to_operand_values() {
    assert_dual("print nil or \"fallback\"", &["fallback"]);
    assert_dual("print 1 or 2", &["1"]);
    assert_dual("print false and 1", &["false"]);
    assert_dual("print 1 and 2", &["2"]);
}

#[test]
fn unary_not_and_negate() {
    assert_dual("print !nil", &["true"]);
    assert_dual("print not true", &["false"]);
    assert_dual("print !0", &["false"]);
}

#[test]
fn truthiness_in_conditions() {
    // Only nil and false are falsy; 0 and "" are truthy.
    assert_dual("if (0) print \"yes\"", &["yes"]);
    assert_dual("if (\"\") print \"yes\"", &["yes"]);
    assert_dual("if (nil) print \"yes\"; else print \"no\"", &["no"]);
}

#[test]
fn if_else_branches() {
    assert_dual("if (1 < 2) print \"then\"; else print \"else\"", &["then"]);
    assert_dual("if (1 > 2) print \"then\"; else print \"else\"", &["else"]);
    assert_dual("if (1 > 2) print \"then\"", &[]);
}

#[test]
fn while_loop_counts() {
    assert_dual(
        "let i = 0\nwhile (i < 3) {\nprint i\ni = i + 1\n}",
        &["0", "1", "2"],
    );
}

#[test]
fn for_loop_counts() {
    assert_dual("for (let i = 0; i < 3; i = i + 1) print i", &["0", "1", "2"]);
}

#[test]
fn assignment_is_an_expression() {
    assert_dual("let x = 1\nprint x = 5", &["5"]);
    assert_dual("let x = 1\nx = x + 1\nprint x", &["2"]);
}

#[test]
fn arrays_display_and_index() {
    assert_dual("print [1, \"two\", nil]", &["[1, two, nil]"]);
    assert_dual("let a = [10, 20, 30]\nprint a[1]", &["20"]);
    assert_dual("let a = [1, 2]\na[0] = 9\nprint a", &["[9, 2]"]);
}

#[test]
fn arrays_are_shared_references() {
    assert_dual(
        "let a = [1]\nlet b = a\npush(b, 2)\nprint a",
        &["[1, 2]"],
    );
}

#[test]
fn array_add_concats_and_appends() {
    assert_dual("print [1] + [2, 3]", &["[1, 2, 3]"]);
    assert_dual("print [1] + 2", &["[1, 2]"]);
    assert_dual("print 0 + [1]", &["[0, 1]"]);
}

#[test]
fn string_indexing_yields_one_character_strings() {
    assert_dual("print \"hat\"[1]", &["a"]);
}

#[test]
fn builtins_operate_at_top_level() {
    assert_output("print len(\"abc\")", &["3"]);
    assert_output("let a = [3, 1, 2]\nsort(a)\nprint a", &["[1, 2, 3]"]);
    assert_output("print slice([1, 2, 3, 4], 1, 3)", &["[2, 3]"]);
    assert_output("print str(12) + str(34)", &["1234"]);
    assert_output("print num(\" 2.5 \") * 2", &["5"]);
}

#[test]
fn undefined_variable_is_a_runtime_error() {
    assert_eq!(run_err("print ghost"), "Runtime error: Undefined variable 'ghost'.");
    assert_eq!(run_err("ghost = 1"), "Runtime error: Undefined variable 'ghost'.");
}

#[test]
fn redefining_a_global_rebinds_it() {
    assert_output("let x = 1\nlet x = 2\nprint x", &["2"]);
}

#[test]
fn comments_are_ignored() {
    assert_output("// leading comment\nprint 1 // trailing\nprint 2", &["1", "2"]);
}

#[test]
fn semicolons_and_newlines_both_terminate() {
    assert_output("print 1; print 2", &["1", "2"]);
}
