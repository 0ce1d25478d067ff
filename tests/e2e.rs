use lox_interpreter_rs::run_to_string;

#[test]
fn prints_an_arithmetic_result() {
    let (out, _, code) = run_to_string("print 1 + 2;");
    assert_eq!(out, "3\n");
    assert_eq!(code, 0);
}

#[test]
fn closures_capture_the_environment_at_definition_time() {
    let (out, _, code) = run_to_string(
        r#"var a = "global"; { fun show() { print a; } show(); var a = "local"; show(); }"#,
    );
    assert_eq!(out, "global\nglobal\n");
    assert_eq!(code, 0);
}

#[test]
fn recursive_fibonacci() {
    let (out, _, code) = run_to_string(
        "fun fib(n) { if (n < 2) return n; return fib(n-1) + fib(n-2); } print fib(10);",
    );
    assert_eq!(out, "55\n");
    assert_eq!(code, 0);
}

#[test]
fn method_dispatch_with_this() {
    let (out, _, code) = run_to_string(
        r#"class Cake {
            taste() {
                var adj = "delicious";
                print "The " + this.flavor + " cake is " + adj + "!";
            }
        }
        var c = Cake();
        c.flavor = "German chocolate";
        c.taste();"#,
    );
    assert_eq!(out, "The German chocolate cake is delicious!\n");
    assert_eq!(code, 0);
}

#[test]
fn super_calls_reach_past_an_intermediate_subclass() {
    let (out, _, code) = run_to_string(
        r#"class A { method() { print "A"; } }
        class B < A { method() { print "B"; } test() { super.method(); } }
        class C < B {}
        C().test();"#,
    );
    assert_eq!(out, "A\n");
    assert_eq!(code, 0);
}

#[test]
fn for_loop_desugars_to_a_while_loop() {
    let (out, _, code) = run_to_string("for (var i = 0; i < 3; i = i + 1) print i;");
    assert_eq!(out, "0\n1\n2\n");
    assert_eq!(code, 0);
}

#[test]
fn subtracting_a_string_is_a_runtime_error() {
    let (out, diagnostics, code) = run_to_string("\"a\" - 1;");
    assert_eq!(out, "");
    assert!(diagnostics.contains("Operands must be numbers."));
    assert!(diagnostics.contains("[line 1]"));
    assert_eq!(code, 70);
}

#[test]
fn returning_from_top_level_is_a_static_error() {
    let (out, diagnostics, code) = run_to_string("return 1;");
    assert_eq!(out, "");
    assert!(diagnostics.contains("[line 1] Error at 'return': Can't return from top-level code."));
    assert_eq!(code, 65);
}

#[test]
fn closures_over_a_later_shadowing_declaration_see_the_outer_binding() {
    let (out, _, code) = run_to_string("var a = 1; { fun f() { print a; } var a = 2; f(); }");
    assert_eq!(out, "1\n");
    assert_eq!(code, 0);
}

#[test]
fn bare_return_in_an_initializer_yields_the_instance() {
    let (out, _, code) = run_to_string(
        r#"class C { init(x) { this.x = x; return; } }
        var c = C(3);
        print c.x;"#,
    );
    assert_eq!(out, "3\n");
    assert_eq!(code, 0);
}

#[test]
fn returning_a_value_from_an_initializer_is_a_static_error() {
    let (_, diagnostics, code) = run_to_string("class C { init() { return 1; } }");
    assert!(diagnostics.contains("Can't return a value from an initializer."));
    assert_eq!(code, 65);
}

#[test]
fn a_runtime_error_raised_inside_init_propagates_and_does_not_construct() {
    let (out, diagnostics, code) = run_to_string(
        r#"class C { init() { this.x = "a" - 1; } } C();"#,
    );
    assert_eq!(out, "");
    assert!(diagnostics.contains("Operands must be numbers."));
    assert_eq!(code, 70);
}

#[test]
fn truthiness_and_equality_rules() {
    let (out, _, code) = run_to_string(
        r#"print !nil == true;
        print !0 == false;
        print nil == nil == true;
        print nil == false == false;
        print "a" == "a" == true;"#,
    );
    assert_eq!(out, "true\ntrue\ntrue\ntrue\ntrue\n");
    assert_eq!(code, 0);
}

#[test]
fn a_malformed_statement_is_reported_without_aborting_the_scan() {
    let (_, diagnostics, code) = run_to_string("print 1; var ; print 2;");
    assert_eq!(code, 65);
    assert!(!diagnostics.is_empty());
}

#[test]
fn the_same_program_produces_the_same_output_every_time() {
    let source = "class A { m() { return 1; } } class B < A { m() { return super.m() + 1; } } print B().m();";
    let (first, _, first_code) = run_to_string(source);
    let (second, _, second_code) = run_to_string(source);
    assert_eq!(first, second);
    assert_eq!(first_code, second_code);
}
