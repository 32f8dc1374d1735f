//! The abstract interpreter: walks the AST threading a [`MultiLabelling`]
//! through statements and computing a [`MultiLabel`] for each expression,
//! against an explicit context stack for implicit (control-dependent) flow.

use crate::ast::{Expr, Module, Stmt};
use crate::element::Ident;
use crate::label::{Label, MultiLabel};
use crate::labelling::MultiLabelling;
use crate::policy::Policy;
use crate::vulnerability::Vulnerability;

pub struct Interpreter {
    /// Stack of context multilabels; bottom is empty. The top is the taint
    /// inherited from every enclosing control decision.
    contexts: Vec<MultiLabel>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Interpreter {
            contexts: vec![MultiLabel::empty()],
        }
    }

    fn current_context(&self) -> MultiLabel {
        self.contexts.last().cloned().unwrap_or_else(MultiLabel::empty)
    }

    pub fn run(&mut self, module: &Module, policy: &Policy) -> Vulnerability {
        let mut vulns = Vulnerability::new();
        self.visit_stmts(&module.body, policy, MultiLabelling::empty(), &mut vulns);
        vulns
    }

    fn visit_stmts(
        &mut self,
        stmts: &[Stmt],
        policy: &Policy,
        mut mtlb: MultiLabelling,
        vulns: &mut Vulnerability,
    ) -> MultiLabelling {
        for stmt in stmts {
            mtlb = self.visit_stmt(stmt, policy, mtlb, vulns);
        }
        mtlb
    }

    fn visit_stmt(
        &mut self,
        stmt: &Stmt,
        policy: &Policy,
        mtlb: MultiLabelling,
        vulns: &mut Vulnerability,
    ) -> MultiLabelling {
        match stmt {
            Stmt::Assign {
                targets,
                value,
                lineno,
            } => self.visit_assign(targets, value, *lineno, policy, mtlb, vulns),
            Stmt::AugAssign {
                target,
                op,
                value,
                lineno,
            } => {
                // `x op= e` re-enters the assignment rule as `x = e op x`.
                let synthetic_value = Expr::BinOp {
                    left: value.clone(),
                    op: *op,
                    right: target.clone(),
                    lineno: *lineno,
                };
                self.visit_assign(
                    std::slice::from_ref(target.as_ref()),
                    &synthetic_value,
                    *lineno,
                    policy,
                    mtlb,
                    vulns,
                )
            }
            Stmt::If { test, body, orelse } => self.visit_if(test, body, orelse, policy, mtlb, vulns),
            Stmt::While { test, body } => self.visit_while(test, body, policy, mtlb, vulns),
            Stmt::For { target, iter, body } => {
                self.visit_for(target, iter, body, policy, mtlb, vulns)
            }
            Stmt::Pass => mtlb,
            Stmt::Expr { value } => {
                self.visit_expr(value, policy, &mtlb, vulns);
                mtlb
            }
        }
    }

    fn visit_assign(
        &mut self,
        targets: &[Expr],
        value: &Expr,
        lineno: i64,
        policy: &Policy,
        mtlb: MultiLabelling,
        vulns: &mut Vulnerability,
    ) -> MultiLabelling {
        let mut value_mlb = self.visit_expr(value, policy, &mtlb, vulns);
        let mut new_mtlb = mtlb;

        for target in targets {
            let components = flat_vars(target);
            let last = components.len().saturating_sub(1);

            for (i, name) in components.iter().enumerate() {
                let bad = policy.find_illegal(name, &mut value_mlb);
                vulns.save(Ident::new(name.clone(), lineno), bad);

                if i == last {
                    new_mtlb.mlabel_set(name, value_mlb.clone());
                } else {
                    let base = new_mtlb
                        .mlabel_of(name)
                        .cloned()
                        .unwrap_or_else(|| MultiLabelling::uninitialized_sentinel(policy, name, lineno));
                    new_mtlb.mlabel_set(name, base.combine(&value_mlb));
                }
            }
        }

        new_mtlb
    }

    fn visit_if(
        &mut self,
        test: &Expr,
        body: &[Stmt],
        orelse: &[Stmt],
        policy: &Policy,
        mtlb: MultiLabelling,
        vulns: &mut Vulnerability,
    ) -> MultiLabelling {
        let condmlb = self.visit_expr(test, policy, &mtlb, vulns);
        let implicit = policy.get_implicit_vulnerabilities();
        self.contexts.push(condmlb.filter_implicit(&implicit));

        let mut taken = self.visit_stmts(body, policy, mtlb.clone(), vulns);
        let mut not_taken = if orelse.is_empty() {
            mtlb
        } else {
            self.visit_stmts(orelse, policy, mtlb.clone(), vulns)
        };

        self.contexts.pop();

        let taken_snapshot = taken.clone();
        let not_taken_snapshot = not_taken.clone();
        MultiLabelling::fill_missing(&mut taken, &not_taken_snapshot, policy);
        MultiLabelling::fill_missing(&mut not_taken, &taken_snapshot, policy);

        taken.combine(&not_taken)
    }

    fn visit_while(
        &mut self,
        test: &Expr,
        body: &[Stmt],
        policy: &Policy,
        mtlb: MultiLabelling,
        vulns: &mut Vulnerability,
    ) -> MultiLabelling {
        let implicit = policy.get_implicit_vulnerabilities();
        let mut cur = mtlb;
        let mut old: Option<MultiLabelling> = None;
        let mut aggregate_cond = MultiLabel::empty();
        let mut iterations: u32 = 0;

        while old.as_ref() != Some(&cur) {
            old = Some(cur.clone());

            let condmlb = self.visit_expr(test, policy, &cur, vulns);
            aggregate_cond = aggregate_cond.combine(&condmlb);
            self.contexts.push(condmlb.filter_implicit(&implicit));

            let mut taken = self.visit_stmts(body, policy, cur.clone(), vulns);
            let mut not_taken = cur.clone();

            let taken_snapshot = taken.clone();
            let not_taken_snapshot = not_taken.clone();
            MultiLabelling::fill_missing(&mut taken, &not_taken_snapshot, policy);
            MultiLabelling::fill_missing(&mut not_taken, &taken_snapshot, policy);

            cur = taken.combine(&not_taken);
            iterations += 1;
        }

        for _ in 0..iterations {
            self.contexts.pop();
        }
        tracing::debug!("while fixed point reached after {iterations} iterations");

        // the post-loop context carries the join of every test value seen:
        // anything downstream may have been influenced by whichever
        // iteration count the loop took
        self.contexts.push(aggregate_cond.filter_implicit(&implicit));

        cur
    }

    fn visit_for(
        &mut self,
        target: &Expr,
        iter: &Expr,
        body: &[Stmt],
        policy: &Policy,
        mtlb: MultiLabelling,
        vulns: &mut Vulnerability,
    ) -> MultiLabelling {
        // `for target in iter: body` rewrites to `while (not iter): target =
        // iter; body`, reusing the while rule verbatim. This avoids modeling
        // the iterator protocol while preserving target's dependency on iter.
        let synthetic_test = Expr::UnaryOp {
            operand: Box::new(iter.clone()),
        };
        let mut synthetic_body = Vec::with_capacity(body.len() + 1);
        synthetic_body.push(Stmt::Assign {
            targets: vec![target.clone()],
            value: iter.clone(),
            lineno: iter.lineno(),
        });
        synthetic_body.extend_from_slice(body);

        self.visit_while(&synthetic_test, &synthetic_body, policy, mtlb, vulns)
    }

    fn visit_expr(
        &mut self,
        expr: &Expr,
        policy: &Policy,
        mtlb: &MultiLabelling,
        vulns: &mut Vulnerability,
    ) -> MultiLabel {
        match expr {
            Expr::Constant { .. } => self.current_context(),
            Expr::Name { id, lineno } => self.visit_name(id, *lineno, policy, mtlb),
            Expr::Compare { left, comparators } => {
                let mut aggregate = self.visit_expr(left, policy, mtlb, vulns);
                for comparator in comparators {
                    let cml = self.visit_expr(comparator, policy, mtlb, vulns);
                    aggregate = cml.combine(&aggregate);
                }
                aggregate
            }
            Expr::BinOp { left, right, .. } => {
                let l = self.visit_expr(left, policy, mtlb, vulns);
                let r = self.visit_expr(right, policy, mtlb, vulns);
                l.combine(&r)
            }
            Expr::BoolOp { values } => values
                .iter()
                .map(|v| self.visit_expr(v, policy, mtlb, vulns))
                .fold(MultiLabel::empty(), |acc, x| acc.combine(&x)),
            Expr::UnaryOp { operand } => self.visit_expr(operand, policy, mtlb, vulns),
            Expr::Attribute { value, attr, lineno } => {
                let value_lbl = self.visit_expr(value, policy, mtlb, vulns);
                let attr_lbl = self.visit_name(attr, *lineno, policy, mtlb);
                value_lbl.combine(&attr_lbl)
            }
            Expr::Call { func, args, lineno } => self.visit_call(func, args, *lineno, policy, mtlb, vulns),
        }
    }

    fn visit_name(&self, id: &str, lineno: i64, policy: &Policy, mtlb: &MultiLabelling) -> MultiLabel {
        match mtlb.mlabel_of(id) {
            Some(stored) => {
                // reads never mutate the stored environment: `-1` sentinels
                // are patched only in the clone returned as this read's value
                let mut patched = MultiLabel::empty();
                for (pattern, label) in &stored.labels {
                    let values = label.values.iter().map(|v| v.patch_sentinel_lineno(lineno)).collect();
                    patched.labels.insert(pattern.clone(), Label::new(pattern.clone(), values));
                }

                // if the variable is itself a source for some pattern, every
                // read is a fresh source occurrence at this line
                let mut as_source = MultiLabel::empty();
                for pattern in policy.search_source(id) {
                    as_source.get_label(pattern).add_source(id, lineno);
                }

                patched.combine(&as_source).combine(&self.current_context())
            }
            None => MultiLabelling::uninitialized_sentinel(policy, id, lineno).combine(&self.current_context()),
        }
    }

    fn visit_call(
        &mut self,
        func: &Expr,
        args: &[Expr],
        lineno: i64,
        policy: &Policy,
        mtlb: &MultiLabelling,
        vulns: &mut Vulnerability,
    ) -> MultiLabel {
        let components = flat_vars(func);

        if components.len() > 1 {
            // `c1.c2....cn(args)` rewrites to the binary join
            // `c1 + c2 + ... + cn(args)`; the receivers are read references
            let mut acc = self.visit_name(&components[0], lineno, policy, mtlb);
            for c in &components[1..components.len() - 1] {
                let cml = self.visit_name(c, lineno, policy, mtlb);
                acc = acc.combine(&cml);
            }
            let name = components.last().unwrap();
            let call_mlb = self.visit_call_by_name(name, args, lineno, policy, mtlb, vulns);
            return acc.combine(&call_mlb);
        }

        self.visit_call_by_name(&components[0], args, lineno, policy, mtlb, vulns)
    }

    fn visit_call_by_name(
        &mut self,
        name: &str,
        args: &[Expr],
        lineno: i64,
        policy: &Policy,
        mtlb: &MultiLabelling,
        vulns: &mut Vulnerability,
    ) -> MultiLabel {
        let mut mlb = self.current_context();
        for arg in args {
            let argmlb = self.visit_expr(arg, policy, mtlb, vulns);
            mlb = mlb.combine(&argmlb);
        }

        // taint first, sanitize second: a name that is both a source and a
        // sanitizer for the same pattern sanitizes the taint it just added
        for pattern in policy.search_source(name) {
            mlb.get_label(pattern).add_source(name, lineno);
        }
        for pattern in policy.search_sanitizer(name) {
            mlb.get_label(pattern).add_sanitizer(name, lineno);
        }

        let bad = policy.find_illegal(name, &mut mlb);
        vulns.save(Ident::new(name.to_string(), lineno), bad);

        mlb
    }
}

/// Receives a `Name` or `Attribute` chain and returns its flattened list of
/// component names, e.g. `flat_vars(a.b.c) = ["a", "b", "c"]`. Any other
/// expression kind as a call target or assignment target is an internal
/// invariant violation — the grammar this interpreter models never produces
/// one (see spec's closed AST), so reaching it indicates a bug upstream.
fn flat_vars(expr: &Expr) -> Vec<String> {
    match expr {
        Expr::Name { id, .. } => vec![id.clone()],
        Expr::Attribute { value, attr, .. } => {
            let mut names = flat_vars(value);
            names.push(attr.clone());
            names
        }
        other => panic!("flat_vars called on a non-Name/Attribute node: {other:?}"),
    }
}

pub fn analyze(module: &Module, policy: &Policy) -> Vulnerability {
    let mut interpreter = Interpreter::new();
    interpreter.run(module, policy)
}
