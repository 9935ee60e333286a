//! The ambient state of attribution, as an immutable value.
//!
//! Every descent derives a new context with `with_*` or [`AttrContext::bind`]
//! and passes it down by reference; leaving the Rust scope restores the
//! enclosing state. Local scopes form a persistent chain, so deriving a
//! context never copies the bindings of outer frames.

use std::rc::Rc;

use indexmap::IndexMap;
use specattr_core::{ClauseKind, DeclId, SpecType, Visibility};

use crate::datagroup::SecrecyContext;

/// What introduced a local name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Param,
    /// A method-body local, from a scope snapshot.
    Local,
    /// Quantifier-bound variable.
    Bound,
    /// `\let` binding.
    Let,
    /// Variable bound by a datatype match arm.
    MatchBound,
    /// `old` or `forall` clause declaration.
    ClauseDecl,
    /// Exception variable of a `signals` clause.
    SignalsVar,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub ty: SpecType,
    pub kind: BindingKind,
    /// Declaration for parameters; `None` for names introduced in specs.
    pub decl: Option<DeclId>,
}

impl Binding {
    pub fn new(ty: SpecType, kind: BindingKind) -> Self {
        Self { ty, kind, decl: None }
    }
}

#[derive(Debug, Default)]
struct Frame {
    vars: IndexMap<String, Binding>,
    parent: Option<Rc<Frame>>,
}

#[derive(Debug, Clone)]
pub struct AttrContext {
    pub class: DeclId,
    pub method: Option<DeclId>,
    /// Declared type of `\result`.
    pub result_ty: Option<SpecType>,
    pub clause: Option<ClauseKind>,
    pub visibility: Visibility,
    pub is_static: bool,
    /// Calls must be to pure methods.
    pub purity_required: bool,
    pub secrecy: SecrecyContext,
    /// Types of a runtime form's captured arguments.
    pub captures: Rc<Vec<SpecType>>,
    scope: Option<Rc<Frame>>,
}

impl AttrContext {
    pub fn for_class(class: DeclId) -> Self {
        Self {
            class,
            method: None,
            result_ty: None,
            clause: None,
            visibility: Visibility::Package,
            is_static: false,
            purity_required: false,
            secrecy: SecrecyContext::default(),
            captures: Rc::new(Vec::new()),
            scope: None,
        }
    }

    pub fn with_method(&self, method: DeclId, result_ty: SpecType, is_static: bool) -> Self {
        Self {
            method: Some(method),
            result_ty: Some(result_ty),
            is_static,
            ..self.clone()
        }
    }

    /// Enter a clause of `kind` declared with `visibility`. Specification
    /// expressions may only call pure methods.
    pub fn with_clause(&self, kind: ClauseKind, visibility: Visibility) -> Self {
        Self {
            clause: Some(kind),
            visibility,
            purity_required: true,
            ..self.clone()
        }
    }

    pub fn with_static(&self, is_static: bool) -> Self {
        Self {
            is_static,
            ..self.clone()
        }
    }

    pub fn with_secrecy(&self, secrecy: SecrecyContext) -> Self {
        Self {
            secrecy,
            ..self.clone()
        }
    }

    pub fn with_captures(&self, captures: Vec<SpecType>) -> Self {
        Self {
            captures: Rc::new(captures),
            ..self.clone()
        }
    }

    /// Open a nested scope holding `bindings`.
    pub fn bind_all(&self, bindings: impl IntoIterator<Item = (String, Binding)>) -> Self {
        let frame = Frame {
            vars: bindings.into_iter().collect(),
            parent: self.scope.clone(),
        };
        Self {
            scope: Some(Rc::new(frame)),
            ..self.clone()
        }
    }

    pub fn bind(&self, name: impl Into<String>, binding: Binding) -> Self {
        self.bind_all([(name.into(), binding)])
    }

    /// Replace every local scope with one holding `bindings`.
    pub fn with_fresh_scope(&self, bindings: impl IntoIterator<Item = (String, Binding)>) -> Self {
        Self {
            scope: None,
            ..self.clone()
        }
        .bind_all(bindings)
    }

    /// Innermost binding of `name`.
    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        let mut frame = self.scope.as_deref();
        while let Some(f) = frame {
            if let Some(b) = f.vars.get(name) {
                return Some(b);
            }
            frame = f.parent.as_deref();
        }
        None
    }

    /// Every visible local name with its innermost binding, outermost first.
    pub fn visible_locals(&self) -> IndexMap<String, Binding> {
        let mut frames = Vec::new();
        let mut frame = self.scope.as_deref();
        while let Some(f) = frame {
            frames.push(f);
            frame = f.parent.as_deref();
        }
        let mut out = IndexMap::new();
        for f in frames.into_iter().rev() {
            for (name, binding) in &f.vars {
                out.insert(name.clone(), binding.clone());
            }
        }
        out
    }

    pub fn clause_kind(&self) -> Option<ClauseKind> {
        self.clause
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_bindings_shadow_and_unwind() {
        let param = Binding::new(SpecType::int(), BindingKind::Param);
        let base = AttrContext::for_class(DeclId(1)).bind("x", param);
        {
            let inner = base.bind("x", Binding::new(SpecType::Boolean, BindingKind::Bound));
            assert_eq!(inner.lookup("x").unwrap().ty, SpecType::Boolean);
        }
        assert_eq!(base.lookup("x").unwrap().ty, SpecType::int());
        assert!(base.lookup("y").is_none());
    }

    #[test]
    fn clause_entry_requires_purity() {
        let cx =
            AttrContext::for_class(DeclId(1)).with_clause(ClauseKind::Ensures, Visibility::Public);
        assert!(cx.purity_required);
        assert_eq!(cx.clause_kind(), Some(ClauseKind::Ensures));
        assert_eq!(cx.visibility, Visibility::Public);
    }

    #[test]
    fn fresh_scope_drops_outer_locals() {
        let cx = AttrContext::for_class(DeclId(1))
            .bind("a", Binding::new(SpecType::int(), BindingKind::Local))
            .bind("b", Binding::new(SpecType::int(), BindingKind::Bound));
        let names: Vec<_> = cx.visible_locals().keys().cloned().collect();
        assert_eq!(names, vec!["a", "b"]);
        let c = Binding::new(SpecType::Boolean, BindingKind::Local);
        let fresh = cx.with_fresh_scope([("c".to_string(), c)]);
        assert!(fresh.lookup("a").is_none());
        assert!(fresh.lookup("c").is_some());
    }
}
