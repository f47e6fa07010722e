// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use crate::*;
use serde_json::json;
use std::fs;
use tempfile::TempDir;

// Helper function to create a filesystem-backed engine for tests
fn create_engine<P: AsRef<std::path::Path>>(root_dir: P) -> Engine<FileSystemResolver> {
    Engine::new(FileSystemResolver::new(root_dir))
}

// Renders source against JSON data with a fresh cache
fn render(source: &str, data: serde_json::Value) -> Result<String> {
    let template = Template::parse("test", source)?;
    let mut context = Context::from_json(data)?;
    template.execute(&ExpressionCache::new(), &mut context)
}

#[cfg(test)]
mod literal_tests {
    use super::*;

    #[test]
    fn test_literal_only_templates_pass_through() {
        for source in [
            "",
            "plain",
            "multi\nline\n\ttext\r\n",
            "single [ and ] brackets, [x] and ]] alone",
            "unterminated [[ opener",
            "unicode: ünïcødé ✓",
        ] {
            assert_eq!(render(source, json!({})).unwrap(), source);
        }
    }

    #[test]
    fn test_comments_produce_nothing() {
        assert_eq!(render("a[[# hidden [[x]] #]]b", json!({})).unwrap(), "ab");
    }
}

#[cfg(test)]
mod control_flow_tests {
    use super::*;

    #[test]
    fn test_if_else_constants() {
        assert_eq!(render("[[if true]]A[[else]]B[[end]]", json!({})).unwrap(), "A");
        assert_eq!(render("[[if false]]A[[else]]B[[end]]", json!({ "x": 1 })).unwrap(), "B");
        assert_eq!(render("[[if True]]A[[else]]B[[end]]", json!({})).unwrap(), "A");
    }

    #[test]
    fn test_elif_chain_uses_data() {
        let source = "[[if port < 1024]]privileged[[elif port < 49152]]registered[[else]]dynamic[[end]]";
        assert_eq!(render(source, json!({ "port": 22 })).unwrap(), "privileged");
        assert_eq!(render(source, json!({ "port": 8080 })).unwrap(), "registered");
        assert_eq!(render(source, json!({ "port": 60000 })).unwrap(), "dynamic");
    }

    #[test]
    fn test_for_over_list_literal() {
        assert_eq!(render("[[for x in [1,2,3]]][[x]],[[end]]", json!({})).unwrap(), "1,2,3,");
    }

    #[test]
    fn test_for_destructures_tuples() {
        assert_eq!(
            render("[[for a, b in [(1,2),(3,4)]]][[a]]-[[b]] [[end]]", json!({})).unwrap(),
            "1-2 3-4 "
        );
    }

    #[test]
    fn test_for_over_dict_yields_keys() {
        let out = render(
            "[[for k in cfg]][[k]]=[[cfg[k]]];[[end]]",
            json!({ "cfg": { "b": 2, "a": "x" } }),
        )
        .unwrap();
        assert_eq!(out, "a=x;b=2;");
    }

    #[test]
    fn test_empty_loop_writes_nothing() {
        assert_eq!(render("<[[for x in xs]][[x]][[end]]>", json!({ "xs": [] })).unwrap(), "<>");
    }
}

#[cfg(test)]
mod scope_tests {
    use super::*;

    #[test]
    fn test_nested_loops_shadow_and_restore() {
        let source = "[[x]]|[[for x in [1,2]]][[x]][[end]]|[[x]]";
        assert_eq!(render(source, json!({ "x": "outer" })).unwrap(), "outer|12|outer");
    }

    #[test]
    fn test_inner_loop_shadows_outer_loop() {
        let source = "[[for x in ['a','b']]][[x]]([[for x in [1,2]]][[x]][[end]])[[x]] [[end]]";
        assert_eq!(render(source, json!({})).unwrap(), "a(12)a b(12)b ");
    }

    #[test]
    fn test_failed_execution_leaves_template_reusable() {
        let template = Template::parse("t", "[[for x in xs]][[x + 1]][[end]]").unwrap();
        let cache = ExpressionCache::new();

        let mut bad = Context::from_json(json!({ "xs": [1, "two"] })).unwrap();
        assert!(template.execute(&cache, &mut bad).is_err());

        let mut good = Context::from_json(json!({ "xs": [1, 2] })).unwrap();
        assert_eq!(template.execute(&cache, &mut good).unwrap(), "23");
    }
}

#[cfg(test)]
mod cache_tests {
    use super::*;

    #[test]
    fn test_loop_body_compiles_once() {
        let template = Template::parse("t", "[[for x in items]][[x + 1]] [[end]]").unwrap();
        let cache = ExpressionCache::new();
        let mut context = Context::from_json(json!({ "items": [1, 2, 3, 4] })).unwrap();

        assert_eq!(template.execute(&cache, &mut context).unwrap(), "2 3 4 5 ");
        let stats = cache.stats();
        // `items` and `x + 1` are each compiled once.
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.hits, 3);
        assert_eq!(stats.entries, 2);
    }
}

#[cfg(test)]
mod error_tests {
    use super::*;

    #[test]
    fn test_unmatched_if_reports_its_line() {
        match render("[[if true]]\nno end here\n", json!({})) {
            Err(PlatenError::StructuralParse { line, .. }) => assert_eq!(line, 1),
            other => panic!("expected structural error, got {:?}", other),
        }
    }

    #[test]
    fn test_function_call_is_unsupported() {
        match render("[[len(items)]]", json!({ "items": [1] })) {
            Err(PlatenError::UnsupportedExpression { expression, reason, data_keys, .. }) => {
                assert_eq!(expression, "len(items)");
                assert!(reason.contains("function call"), "{}", reason);
                assert_eq!(data_keys, vec!["items"]);
            }
            other => panic!("expected unsupported expression, got {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_exec_forms() {
        for source in ["[[exec n += 1]]", "[[exec a, b = 1, 2]]", "[[exec items[0] = 1]]"] {
            assert!(
                matches!(
                    render(source, json!({ "n": 1, "items": [0] })),
                    Err(PlatenError::UnsupportedExpression { .. })
                ),
                "{}",
                source
            );
        }
    }

    #[test]
    fn test_bad_for_shape_is_directive_syntax_error() {
        match render("x\n[[for x of xs]][[end]]", json!({})) {
            Err(PlatenError::DirectiveSyntax { line, directive, .. }) => {
                assert_eq!(line, 2);
                assert_eq!(directive, "for x of xs");
            }
            other => panic!("expected directive syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_undefined_name_is_evaluation_error() {
        let err = render("[[missing]]", json!({})).unwrap_err();
        assert!(matches!(
            err,
            PlatenError::Evaluation { source: EvalError::UndefinedName(_), .. }
        ));
        assert!(err.to_string().contains("name 'missing' is not defined"));
    }
}

#[cfg(test)]
mod value_output_tests {
    use super::*;

    #[test]
    fn test_text_forms() {
        let out = render(
            "[[s]] [[i]] [[f]] [[b]] [[n]] [[l]] [[t]]",
            json!({ "s": "str", "i": 3, "f": 2.0, "b": true, "n": null, "l": [1, "a"], "t": 0 }),
        )
        .unwrap();
        assert_eq!(out, "str 3 2.0 True None [1, 'a'] 0");
        assert_eq!(render("[[(1,)]] [[(1, 'x')]]", json!({})).unwrap(), "(1,) (1, 'x')");
    }

    #[test]
    fn test_numeric_literal_text() {
        assert_eq!(
            render("[[1e20]] [[0.00001]] [[1e16]] [[1.5]] [[3.0]]", json!({})).unwrap(),
            "1e+20 1e-05 1e+16 1.5 3.0"
        );
        assert_eq!(
            render("[[-9223372036854775808]] [[-0x10]]", json!({})).unwrap(),
            "-9223372036854775808 -16"
        );
    }

    #[test]
    fn test_string_building() {
        let out = render(
            "[[for h in hosts]][[h['name'] + '.' + domain]]\n[[end]]",
            json!({ "domain": "lan", "hosts": [{ "name": "web" }, { "name": "db" }] }),
        )
        .unwrap();
        assert_eq!(out, "web.lan\ndb.lan\n");
    }
}

#[cfg(test)]
mod function_tests {
    use super::*;

    #[test]
    fn test_def_and_call() {
        let source = "[[def rule(chain, port)]]-A [[chain]] --dport [[port]] -j ACCEPT\n[[end]]\
                      [[for p in ports]][[call rule('INPUT', p)]][[end]]";
        let out = render(source, json!({ "ports": [22, 80] })).unwrap();
        assert_eq!(
            out,
            "-A INPUT --dport 22 -j ACCEPT\n-A INPUT --dport 80 -j ACCEPT\n"
        );
    }

    #[test]
    fn test_compile_all_covers_function_bodies() {
        let template = Template::parse(
            "check",
            "[[def f(a)]][[a + 1]][[end]][[for x in xs]][[call f(x)]][[end]]",
        )
        .unwrap();
        assert_eq!(template.compile_all(&ExpressionCache::new()).unwrap(), 3);

        let template = Template::parse("check", "[[def f()]][[a.upper]][[end]]").unwrap();
        assert!(matches!(
            template.compile_all(&ExpressionCache::new()),
            Err(PlatenError::UnsupportedExpression { .. })
        ));
    }

    #[test]
    fn test_later_definition_wins() {
        let source = "[[def f()]]one[[end]][[call f()]][[def f()]]two[[end]]";
        assert_eq!(render(source, json!({})).unwrap(), "two");
    }
}

#[cfg(test)]
mod engine_tests {
    use super::*;

    #[test]
    fn test_register_from_files_and_render() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("hosts.tmpl"),
            "# generated\n[[for name, ip in hosts]][[ip]] [[name]]\n[[end]]",
        )
        .unwrap();

        let engine = create_engine(temp_dir.path());
        engine.register("hosts", "hosts.tmpl").unwrap();
        let out = engine
            .render("hosts", &json!({ "hosts": [["web", "10.0.0.1"], ["db", "10.0.0.2"]] }))
            .unwrap();
        assert_eq!(out, "# generated\n10.0.0.1 web\n10.0.0.2 db\n");
    }

    #[test]
    fn test_registered_template_reads_file_once() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("t.tmpl");
        fs::write(&path, "v1").unwrap();

        let engine = create_engine(temp_dir.path());
        engine.register("t", "t.tmpl").unwrap();
        fs::write(&path, "v2").unwrap();
        assert_eq!(engine.render("t", &json!({})).unwrap(), "v1");
    }

    #[test]
    fn test_render_with_serializable_struct() {
        #[derive(serde::Serialize)]
        struct Site {
            name: String,
            replicas: u32,
        }

        let engine = create_engine(".");
        engine
            .register_source("site", "[[name]] x[[replicas]]")
            .unwrap();
        let out = engine
            .render(
                "site",
                &Site {
                    name: "api".to_string(),
                    replicas: 3,
                },
            )
            .unwrap();
        assert_eq!(out, "api x3");
    }
}
