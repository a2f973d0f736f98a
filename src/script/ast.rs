use super::value::Value;
use serde::{Deserialize, Serialize};

/// One statement of a compiled script. The interpreter advances by exactly
/// one statement per step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    /// `let name = expr;`
    Let {
        /// Variable being introduced.
        name: String,
        /// Initialiser expression.
        expr: Expr,
    },
    /// `name = expr;` — the variable must already exist.
    Assign {
        /// Variable being updated.
        name: String,
        /// Replacement expression.
        expr: Expr,
    },
    /// Bare expression statement, usually a host call.
    Expr(Expr),
    /// `if (cond) { … } else { … }`
    If {
        /// Branch condition.
        cond: Expr,
        /// Statements executed when the condition is truthy.
        then_body: Vec<Stmt>,
        /// Optional else branch.
        else_body: Option<Vec<Stmt>>,
    },
    /// `while (cond) { … }`
    While {
        /// Loop condition, re-evaluated before every iteration.
        cond: Expr,
        /// Loop body.
        body: Vec<Stmt>,
    },
}

/// Expression nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Literal value (number, string, bool, null).
    Literal(Value),
    /// List literal `[a, b, c]`.
    List(Vec<Expr>),
    /// Variable reference.
    Var(String),
    /// Member access `object.field` on a map value.
    Member {
        /// Expression producing the map.
        object: Box<Expr>,
        /// Field name.
        field: String,
    },
    /// Index access `object[index]` on a list or map.
    Index {
        /// Expression producing the container.
        object: Box<Expr>,
        /// Index expression.
        index: Box<Expr>,
    },
    /// Unary operator application.
    Unary {
        /// Operator.
        op: UnaryOp,
        /// Operand.
        expr: Box<Expr>,
    },
    /// Binary operator application.
    Binary {
        /// Operator.
        op: BinaryOp,
        /// Left operand.
        lhs: Box<Expr>,
        /// Right operand.
        rhs: Box<Expr>,
    },
    /// Host function call. Only the four host APIs are callable.
    Call {
        /// Function name as written in the script.
        name: String,
        /// Argument expressions.
        args: Vec<Expr>,
    },
    /// `await call(...)` — marks the suspension point explicitly.
    Await(Box<Expr>),
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    /// Logical negation `!`.
    Not,
    /// Arithmetic negation `-`.
    Neg,
}

/// Binary operators, in increasing precedence order within their tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    /// Logical or `||` (short-circuiting).
    Or,
    /// Logical and `&&` (short-circuiting).
    And,
    /// Equality `==`.
    Eq,
    /// Inequality `!=`.
    Ne,
    /// Less-than `<`.
    Lt,
    /// Less-or-equal `<=`.
    Le,
    /// Greater-than `>`.
    Gt,
    /// Greater-or-equal `>=`.
    Ge,
    /// Addition / string concatenation `+`.
    Add,
    /// Subtraction `-`.
    Sub,
    /// Multiplication `*`.
    Mul,
    /// Division `/`.
    Div,
    /// Remainder `%`.
    Rem,
}
