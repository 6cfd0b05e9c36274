//! # Engine Property Tests
//!
//! End-to-end checks of the engine contracts, grouped by concern:
//! - identity registry (registration, resolution, the five key notations)
//! - statement store (duals, indexes, ordering)
//! - qualifier mechanism
//! - scope round-trips
//! - capability propagation

use noema_core::{
    CapabilityPolicy, ItemSpec, KnowledgeGraph, Literal, NoemaError, ObjectValue,
    QualifierFactory, RelationSpec, StatementRole, CUSTOM_CALL_HOOK,
};
use std::sync::Arc;

const MOD: &str = "noema:/test/engine";

fn fresh_graph() -> KnowledgeGraph {
    let mut g = KnowledgeGraph::new().expect("builtins");
    g.register_namespace(MOD, "eg", None).expect("register");
    g.push_namespace(MOD).expect("push");
    g
}

// =============================================================================
// IDENTITY REGISTRY
// =============================================================================

mod identity {
    use super::*;

    /// Registered entities resolve back to the same identity.
    #[test]
    fn resolve_returns_registered_entity() {
        let mut g = fresh_graph();
        let item = g
            .create_item("I2746", ItemSpec::new().label("Rudolf Kalman"))
            .expect("create");
        assert_eq!(g.resolve("I2746").expect("resolve").uri, item);
        assert_eq!(g.resolve(item.as_str()).expect("by uri").uri, item);
    }

    /// Registering the same key twice raises an identity conflict.
    #[test]
    fn duplicate_registration_conflicts() {
        let mut g = fresh_graph();
        g.create_item("I2746", ItemSpec::new()).expect("first");
        assert!(matches!(
            g.create_item("I2746", ItemSpec::new()),
            Err(NoemaError::IdentityConflict(_))
        ));
        // The same number under a different kind tag is a distinct identity.
        g.create_relation("R2746", RelationSpec::new())
            .expect("relation with same number");
    }

    /// All five key notations resolve to the identical entity.
    #[test]
    fn five_notations_are_equivalent() {
        let mut g = fresh_graph();
        let item = g
            .create_item("I2746", ItemSpec::new().label("Rudolf Kalman"))
            .expect("create");
        for notation in [
            "I2746",
            "I2746__Rudolf_Kalman",
            "eg__I2746",
            "eg__I2746__Rudolf_Kalman",
            "I2746[\"Rudolf Kalman\"]",
            "eg__I2746[\"Rudolf Kalman\"]",
        ] {
            assert_eq!(
                g.resolve(notation).expect("resolve").uri,
                item,
                "notation: {notation}"
            );
        }
    }

    /// A malformed kind tag is a key error, not a lookup miss.
    #[test]
    fn malformed_key_is_invalid() {
        let g = fresh_graph();
        assert!(matches!(
            g.resolve("X1234"),
            Err(NoemaError::InvalidKey(_))
        ));
    }

    /// Unresolvable keys surface as not-found.
    #[test]
    fn missing_key_is_not_found() {
        let g = fresh_graph();
        assert!(matches!(g.resolve("I4242"), Err(NoemaError::NotFound(_))));
    }

    /// Registration makes the entity retrievable immediately, without any
    /// commit step.
    #[test]
    fn registration_is_immediately_visible() {
        let mut g = fresh_graph();
        let r = g
            .create_relation("R1000", RelationSpec::new().label("relates"))
            .expect("rel");
        let stm_count = g.statements_for_relation(&r).len();
        assert_eq!(stm_count, 0);
        assert!(g.resolve("R1000").is_ok());
    }
}

// =============================================================================
// STATEMENT STORE
// =============================================================================

mod statements {
    use super::*;

    /// Every entity-valued statement has a dual, retrievable via both the
    /// subject and the object index.
    #[test]
    fn dual_exists_and_is_indexed_both_ways() {
        let mut g = fresh_graph();
        let r = g
            .create_relation("R1000", RelationSpec::new().label("knows"))
            .expect("rel");
        let a = g.create_item("I1000", ItemSpec::new()).expect("a");
        let b = g.create_item("I1001", ItemSpec::new()).expect("b");

        let stm_uri = g.set_relation(&a, &r, b.clone().into()).expect("stm");
        let stm = g.statement(&stm_uri).expect("stored");
        let dual_uri = stm.dual.clone().expect("dual");
        let dual = g.statement(&dual_uri).expect("dual stored");

        // The dual mirrors the triple with swapped lookup direction.
        assert_eq!(dual.role, StatementRole::Dual);
        assert_eq!(dual.subject.uri(), &a);
        assert_eq!(dual.object.as_entity(), Some(&b));
        assert_eq!(dual.dual.as_ref(), Some(&stm_uri));

        assert!(g
            .statements_with_subject_for(&a, &r)
            .iter()
            .any(|s| s.uri == stm_uri));
        assert!(g
            .statements_with_object_for(&b, &r)
            .iter()
            .any(|s| s.uri == dual_uri));
    }

    /// Within an index bucket statements come back in creation order.
    #[test]
    fn bucket_order_is_creation_order() {
        let mut g = fresh_graph();
        let r = g.create_relation("R1000", RelationSpec::new()).expect("r");
        let a = g.create_item("I1000", ItemSpec::new()).expect("a");

        let mut created = Vec::new();
        for value in [3i64, 1, 2] {
            created.push(g.set_relation(&a, &r, value.into()).expect("stm"));
        }
        let bucket: Vec<_> = g
            .statements_with_subject_for(&a, &r)
            .iter()
            .map(|s| s.uri.clone())
            .collect();
        assert_eq!(bucket, created);

        let by_relation: Vec<_> = g
            .statements_for_relation(&r)
            .iter()
            .map(|s| s.uri.clone())
            .collect();
        assert_eq!(by_relation, created);
    }

    /// A non-Relation predicate is rejected as the wrong kind.
    #[test]
    fn predicate_must_be_relation() {
        let mut g = fresh_graph();
        let a = g.create_item("I1000", ItemSpec::new()).expect("a");
        let b = g.create_item("I1001", ItemSpec::new()).expect("b");
        assert!(matches!(
            g.set_relation(&a, &b, ObjectValue::from(1i64)),
            Err(NoemaError::WrongEntityKind { .. })
        ));
    }

    /// Identical triples may coexist; statement identity stays unique.
    #[test]
    fn duplicate_triples_have_distinct_identities() {
        let mut g = fresh_graph();
        let r = g.create_relation("R1000", RelationSpec::new()).expect("r");
        let a = g.create_item("I1000", ItemSpec::new()).expect("a");
        let s1 = g.set_relation(&a, &r, 5i64.into()).expect("s1");
        let s2 = g.set_relation(&a, &r, 5i64.into()).expect("s2");
        assert_ne!(s1, s2);
    }
}

// =============================================================================
// QUALIFIER MECHANISM
// =============================================================================

mod qualifiers {
    use super::*;

    /// The employment scenario: one main edge plus two qualifier statements
    /// whose subject is the main statement.
    #[test]
    fn employment_scenario_produces_three_statements() {
        let mut g = fresh_graph();
        let has_employer = g
            .create_relation("R7301", RelationSpec::new().label("has employer"))
            .expect("rel");
        let start = QualifierFactory::new(
            g.create_relation("R7302", RelationSpec::new().label("start year"))
                .expect("rel"),
        );
        let end = QualifierFactory::new(
            g.create_relation("R7303", RelationSpec::new().label("end year"))
                .expect("rel"),
        );
        let kalman = g
            .create_item("I2746", ItemSpec::new().label("Kalman"))
            .expect("item");
        let stanford = g
            .create_item("I7304", ItemSpec::new().label("Stanford"))
            .expect("item");

        let before = g.statement_count();
        let main = g
            .set_relation_with_qualifiers(
                &kalman,
                &has_employer,
                stanford.clone().into(),
                vec![start.of(1964i64), end.of(1971i64)],
            )
            .expect("stm");
        assert_eq!(g.statement_count() - before, 3);

        // Both qualifiers hang off the main statement.
        let attached = g.statements_with_subject(&main);
        assert_eq!(attached.len(), 2);
        for q in &attached {
            assert!(q.is_qualifier());
            assert_eq!(q.subject.uri(), &main);
        }
        let years: Vec<_> = attached
            .iter()
            .filter_map(|q| q.object.as_literal().and_then(Literal::as_int))
            .collect();
        assert_eq!(years, vec![1964, 1971]);
    }

    /// Qualifiers attached after creation are equivalent to creation-time
    /// qualifiers.
    #[test]
    fn attach_after_creation() {
        let mut g = fresh_graph();
        let r = g.create_relation("R1000", RelationSpec::new()).expect("r");
        let q_rel = g
            .create_relation("R1001", RelationSpec::new().label("confidence"))
            .expect("q");
        let a = g.create_item("I1000", ItemSpec::new()).expect("a");
        let stm = g.set_relation(&a, &r, 1i64.into()).expect("stm");

        let factory = QualifierFactory::new(q_rel.clone());
        g.attach_qualifier(&stm, factory.of(true)).expect("attach");

        let quals = g.statements_with_subject_for(&stm, &q_rel);
        assert_eq!(quals.len(), 1);
        assert_eq!(
            quals[0].object.as_literal().and_then(|l| l.as_bool()),
            Some(true)
        );
    }

    /// An entity-valued qualifier is retrievable from the object side.
    #[test]
    fn entity_valued_qualifier_is_object_indexed() {
        let mut g = fresh_graph();
        let r = g.create_relation("R1000", RelationSpec::new()).expect("r");
        let q_rel = g.create_relation("R1001", RelationSpec::new()).expect("q");
        let a = g.create_item("I1000", ItemSpec::new()).expect("a");
        let target = g.create_item("I1001", ItemSpec::new()).expect("target");

        let factory = QualifierFactory::new(q_rel.clone());
        g.set_relation_with_qualifiers(&a, &r, 1i64.into(), vec![factory.of(target.clone())])
            .expect("stm");

        let from_object = g.statements_with_object_for(&target, &q_rel);
        assert_eq!(from_object.len(), 1);
        assert!(from_object[0].is_qualifier());
    }
}

// =============================================================================
// SCOPES
// =============================================================================

mod scopes {
    use super::*;

    /// Scope round-trip: one SETTING scope item linked via `is scope of`,
    /// every statement created inside tagged via `has defining scope`.
    #[test]
    fn setting_scope_round_trip() {
        let mut g = fresh_graph();
        let class = g
            .create_item("I1000", ItemSpec::new().label("dynamical system"))
            .expect("class");
        let rel = g
            .create_relation("R1000", RelationSpec::new().label("is coupled to"))
            .expect("rel");
        let theorem = g
            .create_item("I1001", ItemSpec::new().label("stability theorem"))
            .expect("thm");

        let mut cm = g.scope(&theorem, "setting").expect("scope");
        let scope_item = cm.scope_item().clone();
        let sys1 = cm.new_var("sys1", "I1000").expect("var");
        let sys2 = cm.new_var("sys2", "I1000").expect("var");
        let stm = cm.new_statement(&sys1, &rel, sys2.clone()).expect("stm");
        cm.close().expect("close");

        // Exactly one scope item, tagged SETTING, linked to the theorem.
        let scopes = g.scopes_of(&theorem);
        assert_eq!(scopes, vec![scope_item.clone()]);
        assert_eq!(g.scope_type_of(&scope_item).as_deref(), Some("SETTING"));

        // The statement carries the defining-scope qualifier.
        let quals = g.statements_with_subject(&stm);
        assert_eq!(quals.len(), 1);
        assert_eq!(quals[0].object.as_entity(), Some(&scope_item));

        // Variables are instances of the class and R20-linked to the scope.
        for var in [&sys1, &sys2] {
            assert!(g.is_instance_of(var, &class));
        }
    }

    /// After closing, the stale context cannot tag further statements.
    #[test]
    fn nesting_discipline_is_enforced() {
        let mut g = fresh_graph();
        g.create_item("I1000", ItemSpec::new()).expect("class");
        let theorem = g.create_item("I1001", ItemSpec::new()).expect("thm");

        let mut outer = g.scope(&theorem, "premise").expect("outer");
        {
            let mut inner = outer.existentially_quantified().expect("inner");
            // The outer scope is inactive while the inner one is open; the
            // inner one accepts work.
            inner.new_condition_var("w", "I1000").expect("cond var");
            inner.close().expect("close inner");
        }
        outer.new_var("v", "I1000").expect("outer active again");
        outer.close().expect("close outer");
        assert!(g.scopes_of(&theorem).len() == 1);
    }

    /// Setting, premise and assertion can coexist on one parent.
    #[test]
    fn three_scopes_on_one_parent() {
        let mut g = fresh_graph();
        let theorem = g.create_item("I1001", ItemSpec::new()).expect("thm");
        for name in ["setting", "premise", "assertion"] {
            g.scope(&theorem, name)
                .expect("open")
                .close()
                .expect("close");
        }
        let scopes = g.scopes_of(&theorem);
        assert_eq!(scopes.len(), 3);
        let types: Vec<_> = scopes
            .iter()
            .filter_map(|s| g.scope_type_of(s))
            .collect();
        assert_eq!(types, vec!["SETTING", "PREMISE", "ASSERTION"]);
    }
}

// =============================================================================
// CAPABILITIES
// =============================================================================

mod capabilities {
    use super::*;

    /// Propagation is a snapshot at creation: instances created before the
    /// capability was added stay non-callable.
    #[test]
    fn snapshot_at_creation() {
        let mut g = fresh_graph();
        let class = g
            .create_item("I1000", ItemSpec::new().label("operator"))
            .expect("class");

        let early = g.instance_of("I1000").expect("early");
        g.add_capability(
            &class,
            CUSTOM_CALL_HOOK,
            Arc::new(|_, _, args| {
                Ok(ObjectValue::from(args.len() as i64))
            }),
        )
        .expect("add");
        let late = g.instance_of("I1000").expect("late");

        assert!(matches!(
            g.call(&early, &[]),
            Err(NoemaError::NotCallable(_))
        ));
        let result = g
            .call(&late, &[ObjectValue::from(1i64), ObjectValue::from(2i64)])
            .expect("call");
        assert_eq!(result.as_literal().and_then(Literal::as_int), Some(2));
    }

    /// Capabilities flow along subclass edges as well.
    #[test]
    fn subclass_inherits_snapshot() {
        let mut g = fresh_graph();
        let parent = g.create_item("I1000", ItemSpec::new()).expect("parent");
        g.add_capability(
            &parent,
            CUSTOM_CALL_HOOK,
            Arc::new(|_, _, _| Ok(ObjectValue::from(true))),
        )
        .expect("add");

        let child = g
            .create_item("I1001", ItemSpec::new().subclass_of("I1000"))
            .expect("child");
        assert!(g.call(&child, &[]).is_ok());
    }

    /// Conflicting hooks from two parents resolve by policy.
    #[test]
    fn multiple_inheritance_precedence() {
        let mut g = fresh_graph();
        let p1 = g.create_item("I1000", ItemSpec::new()).expect("p1");
        let p2 = g.create_item("I1001", ItemSpec::new()).expect("p2");
        for (uri, value) in [(&p1, 10i64), (&p2, 20i64)] {
            let v = value;
            g.add_capability(
                uri,
                CUSTOM_CALL_HOOK,
                Arc::new(move |_, _, _| Ok(ObjectValue::from(v))),
            )
            .expect("add");
        }

        let child_last = g
            .create_item(
                "I1002",
                ItemSpec::new().subclass_of("I1000").subclass_of("I1001"),
            )
            .expect("child");
        assert_eq!(
            g.call(&child_last, &[])
                .expect("call")
                .as_literal()
                .and_then(Literal::as_int),
            Some(20)
        );

        g.set_capability_policy(CapabilityPolicy::FirstWins);
        let child_first = g
            .create_item(
                "I1003",
                ItemSpec::new().subclass_of("I1000").subclass_of("I1001"),
            )
            .expect("child");
        assert_eq!(
            g.call(&child_first, &[])
                .expect("call")
                .as_literal()
                .and_then(Literal::as_int),
            Some(10)
        );
    }

    /// A capability receives the entity it is invoked on.
    #[test]
    fn capability_sees_its_entity() {
        let mut g = fresh_graph();
        let class = g.create_item("I1000", ItemSpec::new()).expect("class");
        g.add_capability(
            &class,
            CUSTOM_CALL_HOOK,
            Arc::new(|graph, this, _| {
                let label = graph.label_text(this).unwrap_or_default();
                Ok(ObjectValue::from(label))
            }),
        )
        .expect("add");
        let inst = g
            .instance_of_with("I1000", Some("named instance"), Vec::new())
            .expect("inst");
        let result = g.call(&inst, &[]).expect("call");
        assert_eq!(
            result.as_literal().and_then(|l| l.as_text().map(str::to_string)),
            Some("named instance".to_string())
        );
    }
}

// =============================================================================
// NAMESPACES
// =============================================================================

mod namespaces {
    use super::*;

    /// Unloading removes a namespace's entities and statements wholesale;
    /// cross-namespace statements referencing them disappear as well.
    #[test]
    fn unload_is_wholesale() {
        let mut g = fresh_graph();
        let shared = g
            .create_item("I1000", ItemSpec::new().label("shared target"))
            .expect("shared");
        let rel = g
            .create_relation("R1000", RelationSpec::new())
            .expect("rel");
        g.pop_namespace().expect("pop");

        g.register_namespace("noema:/test/other", "ot", None)
            .expect("register");
        g.push_namespace("noema:/test/other").expect("push");
        let local = g.create_item("I2000", ItemSpec::new()).expect("local");
        g.set_relation(&local, &rel, shared.clone().into())
            .expect("cross stm");
        g.pop_namespace().expect("pop");

        g.unload_namespace("noema:/test/other").expect("unload");

        assert!(g.entity(&local).is_none());
        // The cross-namespace statement disappeared from the shared
        // entity's object index.
        assert!(g.statements_with_object_for(&shared, &rel).is_empty());
        // The first namespace is untouched.
        assert!(g.entity(&shared).is_some());
        assert!(matches!(
            g.resolve("ot__I2000"),
            Err(NoemaError::UnknownPrefix(_))
        ));
    }

    /// Namespace and prefix registrations conflict on reuse.
    #[test]
    fn namespace_conflicts() {
        let mut g = fresh_graph();
        assert!(matches!(
            g.register_namespace(MOD, "zz", None),
            Err(NoemaError::IdentityConflict(_))
        ));
        assert!(matches!(
            g.register_namespace("noema:/test/fresh", "eg", None),
            Err(NoemaError::IdentityConflict(_))
        ));
    }

    /// Key generation is deterministic per seed and collision-free against
    /// hand-assigned keys.
    #[test]
    fn generated_keys_avoid_collisions() {
        let mut g = fresh_graph();
        let n1 = g.generate_key_number(MOD).expect("key");
        let key = format!("I{n1}");
        g.create_item(&key, ItemSpec::new()).expect("create");
        let n2 = g.generate_key_number(MOD).expect("key");
        assert_ne!(n1, n2);
    }
}
