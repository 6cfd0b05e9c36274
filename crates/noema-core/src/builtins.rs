//! # Built-in Vocabulary
//!
//! The fixed set of entities pre-loaded into every graph: the structural
//! relations the engine itself relies on (labels, taxonomy, scoping,
//! functionality, quantification) and a handful of base items.
//!
//! Key numbers follow the vocabulary of the original knowledge base this
//! engine models, so hand-written modules and documentation stay portable.

use crate::entity::{ItemSpec, RelationSpec};
use crate::graph::KnowledgeGraph;
use crate::keys::make_uri;
use crate::statement::QualifierFactory;
use crate::types::{NoemaError, Uri};

/// Base URI of the built-in namespace.
pub const BUILTINS_URI: &str = "noema:/builtins";

/// Prefix of the built-in namespace.
pub const BUILTINS_PREFIX: &str = "bi";

// =============================================================================
// SHORT KEYS
// =============================================================================

/// `R1 has label` (functional).
pub const R1_HAS_LABEL: &str = "R1";
/// `R2 has description` (functional).
pub const R2_HAS_DESCRIPTION: &str = "R2";
/// `R3 is subclass of`.
pub const R3_IS_SUBCLASS_OF: &str = "R3";
/// `R4 is instance of`.
pub const R4_IS_INSTANCE_OF: &str = "R4";
/// `R20 has defining scope` (functional).
pub const R20_HAS_DEFINING_SCOPE: &str = "R20";
/// `R21 is scope of`.
pub const R21_IS_SCOPE_OF: &str = "R21";
/// `R22 is functional` (functional).
pub const R22_IS_FUNCTIONAL: &str = "R22";
/// `R23 has name in scope` (functional).
pub const R23_HAS_NAME_IN_SCOPE: &str = "R23";
/// `R44 is universally quantified` (functional).
pub const R44_IS_UNIVERSALLY_QUANTIFIED: &str = "R44";
/// `R64 has scope type` (functional).
pub const R64_HAS_SCOPE_TYPE: &str = "R64";
/// `R66 is existentially quantified` (functional).
pub const R66_IS_EXISTENTIALLY_QUANTIFIED: &str = "R66";

/// `I1 general item`.
pub const I1_GENERAL_ITEM: &str = "I1";
/// `I2 metaclass`.
pub const I2_METACLASS: &str = "I2";
/// `I14 proposition`.
pub const I14_PROPOSITION: &str = "I14";
/// `I16 scope`.
pub const I16_SCOPE: &str = "I16";

// =============================================================================
// URI HELPERS
// =============================================================================

/// The full URI of a built-in short key.
#[must_use]
pub fn builtin_uri(short_key: &str) -> Uri {
    make_uri(BUILTINS_URI, short_key)
}

/// URI of `R1 has label`.
#[must_use]
pub fn r1() -> Uri {
    builtin_uri(R1_HAS_LABEL)
}

/// URI of `R2 has description`.
#[must_use]
pub fn r2() -> Uri {
    builtin_uri(R2_HAS_DESCRIPTION)
}

/// URI of `R3 is subclass of`.
#[must_use]
pub fn r3() -> Uri {
    builtin_uri(R3_IS_SUBCLASS_OF)
}

/// URI of `R4 is instance of`.
#[must_use]
pub fn r4() -> Uri {
    builtin_uri(R4_IS_INSTANCE_OF)
}

/// URI of `R20 has defining scope`.
#[must_use]
pub fn r20() -> Uri {
    builtin_uri(R20_HAS_DEFINING_SCOPE)
}

/// URI of `R21 is scope of`.
#[must_use]
pub fn r21() -> Uri {
    builtin_uri(R21_IS_SCOPE_OF)
}

/// URI of `R22 is functional`.
#[must_use]
pub fn r22() -> Uri {
    builtin_uri(R22_IS_FUNCTIONAL)
}

/// URI of `R23 has name in scope`.
#[must_use]
pub fn r23() -> Uri {
    builtin_uri(R23_HAS_NAME_IN_SCOPE)
}

/// URI of `R44 is universally quantified`.
#[must_use]
pub fn r44() -> Uri {
    builtin_uri(R44_IS_UNIVERSALLY_QUANTIFIED)
}

/// URI of `R64 has scope type`.
#[must_use]
pub fn r64() -> Uri {
    builtin_uri(R64_HAS_SCOPE_TYPE)
}

/// URI of `R66 is existentially quantified`.
#[must_use]
pub fn r66() -> Uri {
    builtin_uri(R66_IS_EXISTENTIALLY_QUANTIFIED)
}

/// URI of `I1 general item`.
#[must_use]
pub fn i1() -> Uri {
    builtin_uri(I1_GENERAL_ITEM)
}

/// URI of `I2 metaclass`.
#[must_use]
pub fn i2() -> Uri {
    builtin_uri(I2_METACLASS)
}

/// URI of `I14 proposition`.
#[must_use]
pub fn i14() -> Uri {
    builtin_uri(I14_PROPOSITION)
}

/// URI of `I16 scope`.
#[must_use]
pub fn i16() -> Uri {
    builtin_uri(I16_SCOPE)
}

// =============================================================================
// QUALIFIER FACTORIES
// =============================================================================

/// Factory for `R20 has defining scope` qualifiers: tags a statement as
/// belonging to a scope item.
#[must_use]
pub fn has_defining_scope() -> QualifierFactory {
    QualifierFactory::new(r20())
}

/// Factory for `R44 is universally quantified` qualifiers, e.g.
/// `univ_quant().of_bool(true)` on an instance-creation statement.
#[must_use]
pub fn univ_quant() -> QualifierFactory {
    QualifierFactory::new(r44())
}

/// Factory for `R66 is existentially quantified` qualifiers.
#[must_use]
pub fn exis_quant() -> QualifierFactory {
    QualifierFactory::new(r66())
}

// =============================================================================
// BOOTSTRAP
// =============================================================================

/// Populate a fresh graph with the built-in namespace.
///
/// Creation order matters: R1 must exist before any label binding, and R22
/// must exist before relations can be marked functional, so R1/R2 are
/// created plain and marked functional afterwards.
pub(crate) fn bootstrap(graph: &mut KnowledgeGraph) -> Result<(), NoemaError> {
    graph.register_namespace(BUILTINS_URI, BUILTINS_PREFIX, None)?;
    graph.in_namespace(BUILTINS_URI, |g| {
        g.create_relation(R1_HAS_LABEL, RelationSpec::new().label("has label"))?;
        g.create_relation(
            R2_HAS_DESCRIPTION,
            RelationSpec::new().label("has description"),
        )?;
        g.create_relation(
            R22_IS_FUNCTIONAL,
            RelationSpec::new()
                .label("is functional")
                .description("specifies that a relation admits at most one statement per subject")
                .functional(),
        )?;
        g.set_relation(&r1(), &r22(), true.into())?;
        g.set_relation(&r2(), &r22(), true.into())?;

        g.create_relation(
            R3_IS_SUBCLASS_OF,
            RelationSpec::new().label("is subclass of"),
        )?;
        g.create_relation(
            R4_IS_INSTANCE_OF,
            RelationSpec::new().label("is instance of"),
        )?;
        g.create_relation(
            R20_HAS_DEFINING_SCOPE,
            RelationSpec::new()
                .label("has defining scope")
                .description(
                    "specifies the scope in which an entity or statement is defined \
                     (e.g. the premise of a theorem)",
                )
                .functional(),
        )?;
        g.create_relation(
            R21_IS_SCOPE_OF,
            RelationSpec::new()
                .label("is scope of")
                .description("binds a scope item to its semantic parent; not the inverse of R20"),
        )?;
        g.create_relation(
            R23_HAS_NAME_IN_SCOPE,
            RelationSpec::new()
                .label("has name in scope")
                .description("the local name of an entity within a scope")
                .functional(),
        )?;
        g.create_relation(
            R44_IS_UNIVERSALLY_QUANTIFIED,
            RelationSpec::new()
                .label("is universally quantified")
                .description(
                    "qualifier relation marking a variable as universally quantified (∀)",
                )
                .functional(),
        )?;
        g.create_relation(
            R64_HAS_SCOPE_TYPE,
            RelationSpec::new().label("has scope type").functional(),
        )?;
        g.create_relation(
            R66_IS_EXISTENTIALLY_QUANTIFIED,
            RelationSpec::new()
                .label("is existentially quantified")
                .description(
                    "qualifier relation marking a variable as existentially quantified (∃)",
                )
                .functional(),
        )?;

        g.create_item(I1_GENERAL_ITEM, ItemSpec::new().label("general item"))?;
        g.create_item(
            I2_METACLASS,
            ItemSpec::new()
                .label("metaclass")
                .description(
                    "classes whose instances are themselves classes; the boundary between \
                     class and instance is deliberately not enforced",
                )
                .subclass_of(I1_GENERAL_ITEM),
        )?;
        g.create_item(
            I14_PROPOSITION,
            ItemSpec::new()
                .label("proposition")
                .description("base class for compound knowledge artifacts (theorems, definitions)")
                .subclass_of(I1_GENERAL_ITEM),
        )?;
        g.create_item(
            I16_SCOPE,
            ItemSpec::new()
                .label("scope")
                .description("an instance defines the scope of statements")
                .instance_of(I2_METACLASS),
        )?;
        Ok(())
    })
}

// =============================================================================
// TESTS
// =============================================================================
