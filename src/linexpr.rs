//! Linear expressions and constraints over an opaque variable key.
//!
//! The variable key is any small `Copy` id and coefficients are `f64`, since
//! every model built by this crate — the panel oracle's binary program, the
//! column-generation LPs, the rounding ILPs — needs real-valued objective
//! and constraint coefficients, not just 0/1 boolean algebra.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::Hash;

/// Anything usable as a variable key in a [`LinExpr`].
pub trait VarId: Copy + Ord + Eq + Hash + fmt::Debug {}
impl<T: Copy + Ord + Eq + Hash + fmt::Debug> VarId for T {}

/// A linear expression `Σ c_v * v + constant`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinExpr<V: VarId> {
    coefs: BTreeMap<V, f64>,
    constant: f64,
}

/// Comparison symbol for a [`Constraint`]. Only `=` and `<=` are represented;
/// `>=` constraints are built by flipping the sides and normalizing
/// everything to "lhs (sign) 0".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EqSymbol {
    Equals,
    #[default]
    LessThan,
}

/// A linear constraint, always normalized to `expr (sign) 0`.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint<V: VarId> {
    expr: LinExpr<V>,
    symbol: EqSymbol,
}

impl<V: VarId> LinExpr<V> {
    pub fn var(v: V) -> Self {
        let mut coefs = BTreeMap::new();
        coefs.insert(v, 1.0);
        LinExpr {
            coefs,
            constant: 0.0,
        }
    }

    pub fn constant(c: f64) -> Self {
        LinExpr {
            coefs: BTreeMap::new(),
            constant: c,
        }
    }

    pub fn variables(&self) -> impl Iterator<Item = V> + '_ {
        self.coefs.keys().copied()
    }

    pub fn get(&self, v: V) -> f64 {
        self.coefs.get(&v).copied().unwrap_or(0.0)
    }

    pub fn get_constant(&self) -> f64 {
        self.constant
    }

    pub fn coefficients(&self) -> impl Iterator<Item = (V, f64)> + '_ {
        self.coefs.iter().map(|(&v, &c)| (v, c))
    }

    /// Builds a sum `Σ terms` from an iterator of `(variable, coefficient)`.
    pub fn from_terms<I: IntoIterator<Item = (V, f64)>>(terms: I) -> Self {
        let mut coefs: BTreeMap<V, f64> = BTreeMap::new();
        for (v, c) in terms {
            *coefs.entry(v).or_insert(0.0) += c;
        }
        LinExpr {
            coefs,
            constant: 0.0,
        }
    }

    fn clean(&mut self) {
        self.coefs.retain(|_, c| c.abs() > 1e-12);
    }

    pub fn cleaned(&self) -> Self {
        let mut out = self.clone();
        out.clean();
        out
    }

    pub fn leq(&self, rhs: &LinExpr<V>) -> Constraint<V> {
        Constraint {
            expr: (self - rhs).cleaned(),
            symbol: EqSymbol::LessThan,
        }
    }

    pub fn geq(&self, rhs: &LinExpr<V>) -> Constraint<V> {
        Constraint {
            expr: (rhs - self).cleaned(),
            symbol: EqSymbol::LessThan,
        }
    }

    pub fn eq(&self, rhs: &LinExpr<V>) -> Constraint<V> {
        Constraint {
            expr: (self - rhs).cleaned(),
            symbol: EqSymbol::Equals,
        }
    }
}

impl<V: VarId> Constraint<V> {
    pub fn get_symbol(&self) -> EqSymbol {
        self.symbol
    }

    pub fn get_lhs(&self) -> &LinExpr<V> {
        &self.expr
    }

    pub fn variables(&self) -> impl Iterator<Item = V> + '_ {
        self.expr.variables()
    }
}

impl<V: VarId> fmt::Display for LinExpr<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.coefs.is_empty() && self.constant == 0.0 {
            return write!(f, "0");
        }
        let mut it = self.coefs.iter().peekable();
        while let Some((v, c)) = it.next() {
            write!(f, "{:+}*{:?}", c, v)?;
            if it.peek().is_some() || self.constant != 0.0 {
                write!(f, " ")?;
            }
        }
        if self.constant != 0.0 {
            write!(f, "{:+}", self.constant)?;
        }
        Ok(())
    }
}

impl<V: VarId> fmt::Display for Constraint<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sym = match self.symbol {
            EqSymbol::Equals => "=",
            EqSymbol::LessThan => "<=",
        };
        write!(f, "{} {} 0", self.expr, sym)
    }
}

impl<V: VarId> std::ops::Add for &LinExpr<V> {
    type Output = LinExpr<V>;
    fn add(self, rhs: &LinExpr<V>) -> LinExpr<V> {
        let mut out = self.clone();
        for (v, c) in rhs.coefs.iter() {
            *out.coefs.entry(*v).or_insert(0.0) += c;
        }
        out.constant += rhs.constant;
        out
    }
}

impl<V: VarId> std::ops::Sub for &LinExpr<V> {
    type Output = LinExpr<V>;
    fn sub(self, rhs: &LinExpr<V>) -> LinExpr<V> {
        self + &(-1.0 * rhs)
    }
}

impl<V: VarId> std::ops::Mul<&LinExpr<V>> for f64 {
    type Output = LinExpr<V>;
    fn mul(self, rhs: &LinExpr<V>) -> LinExpr<V> {
        LinExpr {
            coefs: rhs.coefs.iter().map(|(&v, &c)| (v, self * c)).collect(),
            constant: self * rhs.constant,
        }
    }
}

impl<V: VarId> std::ops::Add<LinExpr<V>> for LinExpr<V> {
    type Output = LinExpr<V>;
    fn add(self, rhs: LinExpr<V>) -> LinExpr<V> {
        &self + &rhs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn var_has_unit_coefficient() {
        let e = LinExpr::var(3usize);
        assert_eq!(e.get(3), 1.0);
        assert_eq!(e.get(4), 0.0);
        assert_eq!(e.get_constant(), 0.0);
    }

    #[test]
    fn leq_normalizes_to_lhs_minus_rhs() {
        let a = LinExpr::var(0usize);
        let b = LinExpr::var(1usize);
        let c = a.leq(&b);
        assert_eq!(c.get_symbol(), EqSymbol::LessThan);
        assert_eq!(c.get_lhs().get(0), 1.0);
        assert_eq!(c.get_lhs().get(1), -1.0);
    }

    #[test]
    fn cleaning_drops_zero_coefficients() {
        let a = LinExpr::var(0usize);
        let zeroed = &a - &a;
        assert_eq!(zeroed.cleaned().variables().count(), 0);
    }
}
