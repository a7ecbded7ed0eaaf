//! Piecewise formulas over the kinematic variable and the score.
//!
//! Formulas are written in a small expression language: numbers (with optional exponent, and the
//! constants `inf`, `nan` and `NaN`), variables, the unary operators `-` and `!`, the binary
//! operators `* / + - < <= > >= == != && ||` with the usual precedences, parentheses and the
//! functions `abs`, `sqrt`, `log`, `exp`, `pow`, `min` and `max`. Comparisons and logical
//! operators yield `1.0` or `0.0`; every non-zero value counts as true.

use super::error::{Error, Result};
use super::histogram_set::{HistogramKind, HistogramSet};
use super::rebin::RebinnedBins;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug)]
enum Node {
    Constant(f64),
    Variable(usize),
    Negate(Box<Node>),
    Not(Box<Node>),
    Binary(Operator, Box<Node>, Box<Node>),
    Call(Function, Vec<Node>),
}

#[derive(Clone, Copy, Debug)]
enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Clone, Copy, Debug)]
enum Function {
    Abs,
    Sqrt,
    Log,
    Exp,
    Pow,
    Min,
    Max,
}

impl Function {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "abs" => Self::Abs,
            "sqrt" => Self::Sqrt,
            "log" => Self::Log,
            "exp" => Self::Exp,
            "pow" => Self::Pow,
            "min" => Self::Min,
            "max" => Self::Max,
            _ => return None,
        })
    }

    const fn arity(self) -> usize {
        match self {
            Self::Abs | Self::Sqrt | Self::Log | Self::Exp => 1,
            Self::Pow | Self::Min | Self::Max => 2,
        }
    }
}

const fn truth(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

impl Node {
    #[allow(clippy::float_cmp)]
    fn eval(&self, values: &[f64]) -> f64 {
        match self {
            Self::Constant(value) => *value,
            Self::Variable(index) => values[*index],
            Self::Negate(node) => -node.eval(values),
            Self::Not(node) => truth(node.eval(values) == 0.0),
            Self::Binary(op, lhs, rhs) => {
                let lhs = lhs.eval(values);
                let rhs = rhs.eval(values);

                match op {
                    Operator::Add => lhs + rhs,
                    Operator::Sub => lhs - rhs,
                    Operator::Mul => lhs * rhs,
                    Operator::Div => lhs / rhs,
                    Operator::Eq => truth(lhs == rhs),
                    Operator::Ne => truth(lhs != rhs),
                    Operator::Lt => truth(lhs < rhs),
                    Operator::Le => truth(lhs <= rhs),
                    Operator::Gt => truth(lhs > rhs),
                    Operator::Ge => truth(lhs >= rhs),
                    Operator::And => truth(lhs != 0.0 && rhs != 0.0),
                    Operator::Or => truth(lhs != 0.0 || rhs != 0.0),
                }
            }
            Self::Call(function, args) => {
                let arg = |index: usize| args[index].eval(values);

                match function {
                    Function::Abs => arg(0).abs(),
                    Function::Sqrt => arg(0).sqrt(),
                    Function::Log => arg(0).ln(),
                    Function::Exp => arg(0).exp(),
                    Function::Pow => arg(0).powf(arg(1)),
                    Function::Min => arg(0).min(arg(1)),
                    Function::Max => arg(0).max(arg(1)),
                }
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Number(f64),
    Identifier(String),
    Operator(&'static str),
    LeftParen,
    RightParen,
    Comma,
}

fn tokenize(text: &str) -> Result<Vec<Token>> {
    const OPERATORS: [&str; 15] = [
        "&&", "||", "==", "!=", "<=", ">=", "<", ">", "!", "+", "-", "*", "/", "(", ")",
    ];

    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let rest = &text[pos..];
        let byte = bytes[pos];

        if byte.is_ascii_whitespace() {
            pos += 1;
        } else if byte == b',' {
            tokens.push(Token::Comma);
            pos += 1;
        } else if byte.is_ascii_digit() || byte == b'.' {
            let mut end = pos;

            while end < bytes.len() {
                let c = bytes[end];
                let exponent_sign = (c == b'+' || c == b'-')
                    && end > pos
                    && matches!(bytes[end - 1], b'e' | b'E');

                if c.is_ascii_digit() || matches!(c, b'.' | b'e' | b'E') || exponent_sign {
                    end += 1;
                } else {
                    break;
                }
            }

            let number = &text[pos..end];
            tokens.push(Token::Number(number.parse().map_err(|_| {
                Error::Formula(format!("invalid number `{number}` at position {pos}"))
            })?));
            pos = end;
        } else if byte.is_ascii_alphabetic() || byte == b'_' {
            let end = rest
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .map_or(bytes.len(), |len| pos + len);

            tokens.push(Token::Identifier(text[pos..end].to_owned()));
            pos = end;
        } else if let Some(op) = OPERATORS.iter().find(|op| rest.starts_with(**op)) {
            tokens.push(match *op {
                "(" => Token::LeftParen,
                ")" => Token::RightParen,
                op => Token::Operator(op),
            });
            pos += op.len();
        } else {
            let c = rest.chars().next().unwrap_or_default();
            return Err(Error::Formula(format!(
                "unexpected character `{c}` at position {pos}"
            )));
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    variables: &'a [&'a str],
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += usize::from(token.is_some());
        token
    }

    fn eat_operator(&mut self, ops: &[&'static str]) -> Option<&'static str> {
        match self.peek() {
            Some(Token::Operator(op)) if ops.contains(op) => {
                let op = *op;
                self.pos += 1;
                Some(op)
            }
            _ => None,
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<()> {
        match self.next() {
            Some(token) if token == *expected => Ok(()),
            Some(token) => Err(Error::Formula(format!(
                "expected {expected:?}, found {token:?}"
            ))),
            None => Err(Error::Formula(format!(
                "expected {expected:?}, found end of formula"
            ))),
        }
    }

    fn binary(
        &mut self,
        ops: &[&'static str],
        mut operand: impl FnMut(&mut Self) -> Result<Node>,
        repeat: bool,
    ) -> Result<Node> {
        let mut lhs = operand(self)?;

        while let Some(op) = self.eat_operator(ops) {
            let rhs = operand(self)?;
            let op = match op {
                "+" => Operator::Add,
                "-" => Operator::Sub,
                "*" => Operator::Mul,
                "/" => Operator::Div,
                "==" => Operator::Eq,
                "!=" => Operator::Ne,
                "<" => Operator::Lt,
                "<=" => Operator::Le,
                ">" => Operator::Gt,
                ">=" => Operator::Ge,
                "&&" => Operator::And,
                _ => Operator::Or,
            };
            lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));

            if !repeat {
                break;
            }
        }

        Ok(lhs)
    }

    fn or(&mut self) -> Result<Node> {
        self.binary(&["||"], Self::and, true)
    }

    fn and(&mut self) -> Result<Node> {
        self.binary(&["&&"], Self::comparison, true)
    }

    // comparisons do not chain
    fn comparison(&mut self) -> Result<Node> {
        self.binary(&["==", "!=", "<=", ">=", "<", ">"], Self::sum, false)
    }

    fn sum(&mut self) -> Result<Node> {
        self.binary(&["+", "-"], Self::product, true)
    }

    fn product(&mut self) -> Result<Node> {
        self.binary(&["*", "/"], Self::unary, true)
    }

    fn unary(&mut self) -> Result<Node> {
        match self.eat_operator(&["-", "!", "+"]) {
            Some("-") => Ok(Node::Negate(Box::new(self.unary()?))),
            Some("!") => Ok(Node::Not(Box::new(self.unary()?))),
            Some(_) => self.unary(),
            None => self.atom(),
        }
    }

    fn atom(&mut self) -> Result<Node> {
        match self.next() {
            Some(Token::Number(value)) => Ok(Node::Constant(value)),
            Some(Token::LeftParen) => {
                let node = self.or()?;
                self.expect(&Token::RightParen)?;
                Ok(node)
            }
            Some(Token::Identifier(name)) if self.peek() == Some(&Token::LeftParen) => {
                self.pos += 1;

                let function = Function::from_name(&name)
                    .ok_or_else(|| Error::Formula(format!("unknown function `{name}`")))?;
                let mut args = vec![self.or()?];

                while self.peek() == Some(&Token::Comma) {
                    self.pos += 1;
                    args.push(self.or()?);
                }

                self.expect(&Token::RightParen)?;

                if args.len() != function.arity() {
                    return Err(Error::Formula(format!(
                        "`{name}` takes {} argument(s), got {}",
                        function.arity(),
                        args.len()
                    )));
                }

                Ok(Node::Call(function, args))
            }
            Some(Token::Identifier(name)) => match name.as_str() {
                "inf" => Ok(Node::Constant(f64::INFINITY)),
                "nan" | "NaN" => Ok(Node::Constant(f64::NAN)),
                _ => self
                    .variables
                    .iter()
                    .position(|variable| *variable == name)
                    .map(Node::Variable)
                    .ok_or_else(|| Error::Formula(format!("unknown variable `{name}`"))),
            },
            Some(token) => Err(Error::Formula(format!("unexpected {token:?}"))),
            None => Err(Error::Formula("unexpected end of formula".to_owned())),
        }
    }
}

/// A parsed formula, ready to be evaluated.
#[derive(Clone, Debug)]
pub struct Formula {
    root: Node,
    variables: usize,
}

impl Formula {
    /// Parses `text`, which may only refer to the given `variables`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Formula`] if `text` is not a valid formula.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use tauid_sf::formula::Formula;
    ///
    /// let formula = Formula::compile("(x>20 && x<=30)*2.5 + pow(y, 2)", &["x", "y"]).unwrap();
    /// assert_eq!(formula.eval(&[25.0, 3.0]), 11.5);
    /// ```
    pub fn compile(text: &str, variables: &[&str]) -> Result<Self> {
        let tokens = tokenize(text)?;
        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
            variables,
        };
        let root = parser.or()?;

        if let Some(token) = parser.peek() {
            return Err(Error::Formula(format!(
                "unexpected {token:?} after the end of the formula"
            )));
        }

        Ok(Self {
            root,
            variables: variables.len(),
        })
    }

    /// Evaluates the formula with `values` assigned to the variables given to
    /// [`Formula::compile`].
    ///
    /// # Panics
    ///
    /// Panics if fewer values than variables are given.
    #[must_use]
    pub fn eval(&self, values: &[f64]) -> f64 {
        assert!(values.len() >= self.variables);
        self.root.eval(values)
    }
}

/// A formula over the kinematic variable `x` and the score `y`, defined on a rectangular domain.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Formula2D {
    /// Name of the formula.
    pub name: String,
    /// Text of the formula.
    pub expression: String,
    /// Lower end of the kinematic range.
    pub x_min: f64,
    /// Upper end of the kinematic range.
    pub x_max: f64,
    /// Lower end of the score range.
    pub y_min: f64,
    /// Upper end of the score range.
    pub y_max: f64,
}

impl Formula2D {
    /// Variables the expression may refer to.
    pub const VARIABLES: [&'static str; 2] = ["x", "y"];

    /// Creates a formula on the default domain `[0, 1000] x [0, 1]`.
    #[must_use]
    pub fn new(name: &str, expression: String) -> Self {
        Self {
            name: name.to_owned(),
            expression,
            x_min: 0.0,
            x_max: 1000.0,
            y_min: 0.0,
            y_max: 1.0,
        }
    }

    /// Parses the expression.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Formula`] if the expression is invalid.
    pub fn compile(&self) -> Result<Formula> {
        Formula::compile(&self.expression, &Self::VARIABLES)
    }

    /// Evaluates the formula at `(x, y)`. To evaluate many points, use [`Formula2D::compile`]
    /// once instead.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Formula`] if the expression is invalid.
    pub fn eval(&self, x: f64, y: f64) -> Result<f64> {
        Ok(self.compile()?.eval(&[x, y]))
    }
}

/// Writes the scale factors of a set that has been rebinned and remapped onto the score axis as
/// a piecewise-constant formula named `name`. Every kinematic bin `(lo, hi]` contributes a term
/// selecting its score bins, the last kinematic bin is open towards large values.
///
/// Terms are gated by multiplying with comparisons that evaluate to `0.0` or `1.0`, so a single
/// non-finite scale factor makes the formula non-finite everywhere: `0 * inf` and `0 * NaN` are
/// `NaN`, also for points outside the affected bin.
///
/// # Errors
///
/// Returns an error if there are no scale factors or if a key has no matching entry in `bins`.
pub fn sf_formula(set: &HistogramSet, bins: &RebinnedBins, name: &str) -> Result<Formula2D> {
    let histograms: Vec<_> = set.histograms(HistogramKind::Sf)?.collect();

    if histograms.is_empty() {
        return Err(Error::General("no scale factors to write".to_owned()));
    }

    let mut terms = Vec::with_capacity(histograms.len());

    for (index, (key, histogram)) in histograms.iter().enumerate() {
        let entry = bins
            .get(key)
            .ok_or_else(|| Error::General(format!("no rebinned working points for `{key}`")))?;

        if entry.working_points.len() != histogram.bins() {
            return Err(Error::IncompatibleBinning(format!(
                "`{key}` has {} working points but {} score bins",
                entry.working_points.len(),
                histogram.bins()
            )));
        }

        let mut term = if index + 1 == histograms.len() {
            format!("((x>{:?})*(", entry.bin.low)
        } else {
            format!("((x>{:?} && x<={:?})*(", entry.bin.low, entry.bin.high)
        };

        let limits = histogram.limits().limits();
        let slices: Vec<_> = histogram
            .contents()
            .iter()
            .enumerate()
            .map(|(bin, content)| {
                if bin + 1 == histogram.bins() {
                    format!("({content:?}*(y>{:?}))", limits[bin])
                } else {
                    format!(
                        "({content:?}*(y>{:?} && y<={:?}))",
                        limits[bin],
                        limits[bin + 1]
                    )
                }
            })
            .collect();

        term.push_str(&slices.join(" + "));
        term.push_str("))");
        terms.push(term);
    }

    Ok(Formula2D::new(name, format!("({})", terms.join(" + "))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bin::{BinLimits, KinematicBin};
    use crate::histogram::Histogram;
    use crate::rebin::RebinnedBin;
    use std::collections::BTreeMap;

    fn eval(text: &str, x: f64, y: f64) -> f64 {
        Formula::compile(text, &Formula2D::VARIABLES)
            .unwrap()
            .eval(&[x, y])
    }

    #[test]
    fn precedence() {
        assert_eq!(eval("2 + 3 * 4", 0.0, 0.0), 14.0);
        assert_eq!(eval("(2 + 3) * 4", 0.0, 0.0), 20.0);
        assert_eq!(eval("10 - 4 - 3", 0.0, 0.0), 3.0);
        assert_eq!(eval("-x * 2 + y", 3.0, 1.0), -5.0);
        assert_eq!(eval("x > 1 && y < 2 || 0", 2.0, 1.0), 1.0);
        assert_eq!(eval("1 + 2 > 2", 0.0, 0.0), 1.0);
        assert_eq!(eval("!(x > 3)", 2.0, 0.0), 1.0);
        assert_eq!(eval("!x", 0.5, 0.0), 0.0);
    }

    #[test]
    fn numbers_and_constants() {
        assert_eq!(eval("1.5e2 + 3E-1", 0.0, 0.0), 150.3);
        assert_eq!(eval("1e-5 * 1e5", 0.0, 0.0), 1.0);
        assert_eq!(eval(".5", 0.0, 0.0), 0.5);
        assert_eq!(eval("-inf", 0.0, 0.0), f64::NEG_INFINITY);
        assert!(eval("NaN", 0.0, 0.0).is_nan());
        assert!(eval("nan + 1", 0.0, 0.0).is_nan());
    }

    #[test]
    fn functions() {
        assert_eq!(eval("sqrt(x)", 9.0, 0.0), 3.0);
        assert_eq!(eval("pow(x, y)", 2.0, 10.0), 1024.0);
        assert_eq!(eval("max(x, y) - min(x, y)", 2.0, 7.0), 5.0);
        assert_eq!(eval("abs(-x)", 2.0, 0.0), 2.0);
        assert_eq!(eval("log(exp(0))", 0.0, 0.0), 0.0);
    }

    #[test]
    fn comparisons_are_exact() {
        assert_eq!(eval("x == 0.1", 0.1, 0.0), 1.0);
        assert_eq!(eval("x != 0.1", 0.1 + 2e-16, 0.0), 1.0);
        assert_eq!(eval("(x>20 && x<=30)", 30.0, 0.0), 1.0);
        assert_eq!(eval("(x>20 && x<=30)", 20.0, 0.0), 0.0);
    }

    #[test]
    fn invalid_formulas() {
        for text in [
            "",
            "x +",
            "(x",
            "x)",
            "z * 2",
            "foo(1)",
            "pow(1)",
            "min(1, 2, 3)",
            "1 # 2",
            "1..2",
            "x ≥ 1",
        ] {
            assert!(
                matches!(
                    Formula::compile(text, &Formula2D::VARIABLES),
                    Err(Error::Formula(_))
                ),
                "{text}"
            );
        }
    }

    fn remapped() -> (HistogramSet, RebinnedBins) {
        remapped_from([
            (20.0, 40.0, vec![0.25, 0.5, 0.9], vec![1.1, 0.95, 0.9]),
            (40.0, 1000.0, vec![0.25, 0.9], vec![1.05, 1.0 / 3.0]),
        ])
    }

    fn remapped_from<const N: usize>(
        entries: [(f64, f64, Vec<f64>, Vec<f64>); N],
    ) -> (HistogramSet, RebinnedBins) {
        let mut keys = Vec::new();
        let mut sf = BTreeMap::new();
        let mut bins = Vec::new();

        for (low, high, mut edges, contents) in entries {
            let bin = KinematicBin { low, high };
            let working_points = (0..contents.len()).map(|wp| format!("Loose{wp}")).collect();
            edges.push(1.0);

            keys.push(bin.label());
            sf.insert(
                bin.label(),
                Histogram::from_contents(BinLimits::new(edges).unwrap(), contents).unwrap(),
            );
            bins.push(RebinnedBin {
                bin,
                working_points,
            });
        }

        (
            HistogramSet::from_parts(keys, [(HistogramKind::Sf, sf)].into_iter().collect()),
            bins.into_iter().collect(),
        )
    }

    #[test]
    fn sf_formula_text() {
        let (set, bins) = remapped();
        let formula = sf_formula(&set, &bins, "sf").unwrap();

        assert_eq!(formula.name, "sf");
        assert_eq!((formula.x_min, formula.x_max), (0.0, 1000.0));
        assert_eq!((formula.y_min, formula.y_max), (0.0, 1.0));
        assert_eq!(
            formula.expression,
            "(((x>20.0 && x<=40.0)*((1.1*(y>0.25 && y<=0.5)) + (0.95*(y>0.5 && y<=0.9)) + \
             (0.9*(y>0.9)))) + ((x>40.0)*((1.05*(y>0.25 && y<=0.9)) + \
             (0.3333333333333333*(y>0.9)))))"
        );
    }

    #[test]
    fn sf_formula_reproduces_bin_contents() {
        let (set, bins) = remapped();
        let formula = sf_formula(&set, &bins, "sf").unwrap().compile().unwrap();

        for entry in bins.iter() {
            let histogram = set.get(HistogramKind::Sf, &entry.bin.label()).unwrap();
            // the last kinematic bin is open ended
            let x = 0.5 * (entry.bin.low + entry.bin.high);

            for (center, content) in histogram
                .limits()
                .centers()
                .into_iter()
                .zip(histogram.contents())
            {
                assert_eq!(formula.eval(&[x, center]), *content);
            }

            assert_eq!(formula.eval(&[x, 0.1]), 0.0);
        }

        assert_eq!(formula.eval(&[2000.0, 0.95]), 1.0 / 3.0);
        assert_eq!(formula.eval(&[10.0, 0.95]), 0.0);
    }

    #[test]
    fn non_finite_scale_factor_spreads() {
        let (set, bins) = remapped_from([
            (20.0, 40.0, vec![0.25, 0.75], vec![1.1, 0.9]),
            (40.0, 1000.0, vec![0.25, 0.75], vec![f64::INFINITY, 0.6]),
        ]);
        let formula = sf_formula(&set, &bins, "sf").unwrap().compile().unwrap();

        // closed gates multiply the infinite constant with zero
        assert!(formula.eval(&[30.0, 0.5]).is_nan());
        assert!(formula.eval(&[30.0, 0.9]).is_nan());
        assert!(formula.eval(&[500.0, 0.9]).is_nan());
        assert_eq!(formula.eval(&[500.0, 0.5]), f64::INFINITY);
    }

    #[test]
    fn sf_formula_errors() {
        let (set, _) = remapped();

        assert!(matches!(
            sf_formula(&set, &RebinnedBins::default(), "sf"),
            Err(Error::General(_))
        ));
        assert!(matches!(
            sf_formula(&HistogramSet::new(), &RebinnedBins::default(), "sf"),
            Err(Error::MissingKind(_))
        ));
    }
}
