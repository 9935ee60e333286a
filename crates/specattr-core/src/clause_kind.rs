//! The closed set of clause kinds and their behavior table.
//!
//! Every kind carries a [`ClauseInfo`] describing how it is recognized,
//! where it may appear, how its body is type-checked, its role in the
//! clause-order state machine, which visibility rule governs the symbols it
//! references, and which pseudo-identifiers it may use. Passes dispatch on
//! these fields rather than matching on individual kinds, so adding a kind
//! means adding one table row.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a clause may be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placement {
    /// Inside a method specification case.
    MethodCase,
    /// In a type body, governing all instances.
    TypeBody,
    /// Attached to a field declaration.
    FieldAnnotation,
    /// Inside a method body at a program point.
    Statement,
}

/// How a clause's body is type-checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClauseCheck {
    /// Boolean predicate.
    Predicate,
    /// Integral-valued expression (variants, resource bounds).
    Integral,
    /// `recommends P for E`
    Recommends,
    /// `signals (E e) P`
    Signals,
    /// `signals_only E1, E2`
    TypeList,
    /// Frame targets.
    StoreRefs,
    /// Method name list or keyword.
    Callable,
    /// `old` / `forall` declarations visible to later clauses.
    Declarations,
    /// Nested specification cases.
    Group,
    /// `represents f = e`
    Represents,
    /// `in g1, g2`
    Membership,
    /// `maps e \into g`
    Maps,
}

/// A clause's role in the per-case ordering state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderRole {
    /// Legal only before any postcondition-like clause.
    Precondition,
    /// Moves the case into the postcondition region.
    Postcondition,
    /// Opens a nested group; legal only before any postcondition.
    GroupStart,
    /// Not classified; passed through unchecked.
    Unclassified,
}

/// Rule relating a referenced symbol's visibility to the clause's own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VisibilityRule {
    /// Symbol visibility must equal the clause visibility.
    Exact,
    /// Symbol must be at least as visible as the clause.
    AtLeast,
    /// Datagroup membership: group at least as visible as the member.
    Membership,
    /// Body-level clauses see whatever the method body sees.
    Unchecked,
}

/// Static behavior attached to a clause kind.
#[derive(Debug, Clone, Copy)]
pub struct ClauseInfo {
    pub keyword: &'static str,
    pub aliases: &'static [&'static str],
    pub placement: Placement,
    pub check: ClauseCheck,
    pub order: OrderRole,
    pub visibility: VisibilityRule,
    /// `\result` is meaningful.
    pub allows_result: bool,
    /// Unlabeled `\old(e)` and `\pre(e)` are meaningful.
    pub allows_old: bool,
    /// `\old(e, L)` naming a body label is meaningful.
    pub allows_labeled_old: bool,
}

const fn info(
    keyword: &'static str,
    aliases: &'static [&'static str],
    placement: Placement,
    check: ClauseCheck,
    order: OrderRole,
    visibility: VisibilityRule,
) -> ClauseInfo {
    ClauseInfo {
        keyword,
        aliases,
        placement,
        check,
        order,
        visibility,
        allows_result: false,
        allows_old: false,
        allows_labeled_old: false,
    }
}

const fn method_case(
    keyword: &'static str,
    aliases: &'static [&'static str],
    check: ClauseCheck,
    order: OrderRole,
) -> ClauseInfo {
    info(keyword, aliases, Placement::MethodCase, check, order, VisibilityRule::AtLeast)
}

const fn type_body(
    keyword: &'static str,
    check: ClauseCheck,
    visibility: VisibilityRule,
) -> ClauseInfo {
    info(keyword, &[], Placement::TypeBody, check, OrderRole::Unclassified, visibility)
}

const fn field_annotation(
    keyword: &'static str,
    check: ClauseCheck,
    visibility: VisibilityRule,
) -> ClauseInfo {
    info(keyword, &[], Placement::FieldAnnotation, check, OrderRole::Unclassified, visibility)
}

const fn statement(
    keyword: &'static str,
    aliases: &'static [&'static str],
    check: ClauseCheck,
) -> ClauseInfo {
    info(
        keyword,
        aliases,
        Placement::Statement,
        check,
        OrderRole::Unclassified,
        VisibilityRule::Unchecked,
    )
}

const fn post_state(mut i: ClauseInfo) -> ClauseInfo {
    i.allows_result = true;
    i.allows_old = true;
    i
}

const fn old_only(mut i: ClauseInfo) -> ClauseInfo {
    i.allows_old = true;
    i
}

const fn body_state(mut i: ClauseInfo) -> ClauseInfo {
    i.allows_old = true;
    i.allows_labeled_old = true;
    i
}

/// Every clause kind the attribution engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ClauseKind {
    Requires,
    Recommends,
    Ensures,
    Signals,
    SignalsOnly,
    Assignable,
    Accessible,
    Callable,
    Diverges,
    When,
    MeasuredBy,
    Duration,
    WorkingSpace,
    Old,
    Forall,
    SpecGroup,
    Invariant,
    Constraint,
    Initially,
    Axiom,
    Represents,
    In,
    Maps,
    Assert,
    Assume,
    LoopInvariant,
    Decreases,
}

impl ClauseKind {
    pub const ALL: [ClauseKind; 27] = [
        ClauseKind::Requires,
        ClauseKind::Recommends,
        ClauseKind::Ensures,
        ClauseKind::Signals,
        ClauseKind::SignalsOnly,
        ClauseKind::Assignable,
        ClauseKind::Accessible,
        ClauseKind::Callable,
        ClauseKind::Diverges,
        ClauseKind::When,
        ClauseKind::MeasuredBy,
        ClauseKind::Duration,
        ClauseKind::WorkingSpace,
        ClauseKind::Old,
        ClauseKind::Forall,
        ClauseKind::SpecGroup,
        ClauseKind::Invariant,
        ClauseKind::Constraint,
        ClauseKind::Initially,
        ClauseKind::Axiom,
        ClauseKind::Represents,
        ClauseKind::In,
        ClauseKind::Maps,
        ClauseKind::Assert,
        ClauseKind::Assume,
        ClauseKind::LoopInvariant,
        ClauseKind::Decreases,
    ];

    /// The behavior table row for this kind.
    pub const fn info(self) -> ClauseInfo {
        use ClauseCheck as C;
        use OrderRole as O;
        use VisibilityRule as V;
        let row = match self {
            ClauseKind::Requires => {
                method_case("requires", &["pre"], C::Predicate, O::Precondition)
            }
            ClauseKind::Recommends => {
                method_case("recommends", &[], C::Recommends, O::Unclassified)
            }
            ClauseKind::Ensures => {
                method_case("ensures", &["post"], C::Predicate, O::Postcondition)
            }
            ClauseKind::Signals => {
                method_case("signals", &["exsures"], C::Signals, O::Postcondition)
            }
            ClauseKind::SignalsOnly => {
                method_case("signals_only", &[], C::TypeList, O::Postcondition)
            }
            ClauseKind::Assignable => method_case(
                "assignable",
                &["modifies", "modifiable", "assigns", "writes"],
                C::StoreRefs,
                O::Postcondition,
            ),
            ClauseKind::Accessible => {
                method_case("accessible", &["reads"], C::StoreRefs, O::Unclassified)
            }
            ClauseKind::Callable => method_case("callable", &[], C::Callable, O::Postcondition),
            ClauseKind::Diverges => method_case("diverges", &[], C::Predicate, O::Unclassified),
            ClauseKind::When => method_case("when", &[], C::Predicate, O::Unclassified),
            ClauseKind::MeasuredBy => method_case("measured_by", &[], C::Integral, O::Unclassified),
            ClauseKind::Duration => method_case("duration", &[], C::Integral, O::Unclassified),
            ClauseKind::WorkingSpace => {
                method_case("working_space", &[], C::Integral, O::Unclassified)
            }
            ClauseKind::Old => method_case("old", &[], C::Declarations, O::Precondition),
            ClauseKind::Forall => method_case("forall", &[], C::Declarations, O::Precondition),
            ClauseKind::SpecGroup => method_case("{|", &[], C::Group, O::GroupStart),
            ClauseKind::Invariant => type_body("invariant", C::Predicate, V::Exact),
            ClauseKind::Constraint => type_body("constraint", C::Predicate, V::Exact),
            ClauseKind::Initially => type_body("initially", C::Predicate, V::Exact),
            ClauseKind::Axiom => type_body("axiom", C::Predicate, V::Exact),
            ClauseKind::Represents => type_body("represents", C::Represents, V::AtLeast),
            ClauseKind::In => field_annotation("in", C::Membership, V::Membership),
            ClauseKind::Maps => field_annotation("maps", C::Maps, V::AtLeast),
            ClauseKind::Assert => statement("assert", &[], C::Predicate),
            ClauseKind::Assume => statement("assume", &[], C::Predicate),
            ClauseKind::LoopInvariant => {
                statement("loop_invariant", &["maintaining"], C::Predicate)
            }
            ClauseKind::Decreases => statement("decreases", &["decreasing"], C::Integral),
        };
        match self {
            ClauseKind::Ensures | ClauseKind::Duration | ClauseKind::WorkingSpace => {
                post_state(row)
            }
            ClauseKind::Signals | ClauseKind::Diverges | ClauseKind::Constraint => old_only(row),
            ClauseKind::Assert
            | ClauseKind::Assume
            | ClauseKind::LoopInvariant
            | ClauseKind::Decreases => body_state(row),
            _ => row,
        }
    }

    pub fn keyword(self) -> &'static str {
        self.info().keyword
    }

    /// Recognize a clause keyword, including aliases and `_redundantly` forms.
    pub fn from_keyword(word: &str) -> Option<ClauseKind> {
        let base = word.strip_suffix("_redundantly").unwrap_or(word);
        ClauseKind::ALL.into_iter().find(|kind| {
            let i = kind.info();
            i.keyword == base || i.aliases.contains(&base)
        })
    }

    pub fn placement(self) -> Placement {
        self.info().placement
    }
}

impl fmt::Display for ClauseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}
