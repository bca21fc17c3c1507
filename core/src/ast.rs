//! Abstract syntax tree for Duck classes.
//!
//! This is the input contract of the compiler: a class with `int` fields and
//! `int` methods, already parsed, with operator precedence encoded in the
//! shape of the tree and literal values resolved to 32-bit integers.
//!
//! The `Display` implementations print Java-like source that the parser
//! reads back into an equivalent tree.

use core::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Class {
    pub name: String,
    pub fields: Vec<FieldDecl>,
    pub methods: Vec<MethodDecl>,
}

/// An `int` field. A missing initializer means the field holds `0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    pub value: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDecl {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stmt {
    Block(Vec<Stmt>),
    LocalVarDecl {
        name: String,
        init: Option<Expr>,
    },
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    Return(Expr),
    /// Expression evaluated for its side effect; the value is discarded.
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expr {
    Literal(i32),
    /// A bare name: a parameter, a local or a field, in that lookup order.
    Var(String),
    /// `this.name`: always a field, never a local.
    FieldAccess(String),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Assign {
        target: String,
        value: Box<Expr>,
    },
    Call {
        method: String,
        args: Vec<Expr>,
    },
    /// A node kind outside the modeled subset (strings, objects, arrays...).
    /// The payload describes the construct for error messages.
    Unsupported(String),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Plus => "+",
            UnaryOp::Not => "!",
        }
    }
}

// === Construction helpers ===

impl Expr {
    pub fn lit(value: i32) -> Expr {
        Expr::Literal(value)
    }

    pub fn var(name: &str) -> Expr {
        Expr::Var(name.to_string())
    }

    pub fn field(name: &str) -> Expr {
        Expr::FieldAccess(name.to_string())
    }

    pub fn unary(op: UnaryOp, expr: Expr) -> Expr {
        Expr::Unary {
            op,
            expr: Box::new(expr),
        }
    }

    pub fn neg(expr: Expr) -> Expr {
        Expr::unary(UnaryOp::Neg, expr)
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn assign(target: &str, value: Expr) -> Expr {
        Expr::Assign {
            target: target.to_string(),
            value: Box::new(value),
        }
    }

    pub fn call(method: &str, args: Vec<Expr>) -> Expr {
        Expr::Call {
            method: method.to_string(),
            args,
        }
    }
}

impl Stmt {
    pub fn local(name: &str, init: Option<Expr>) -> Stmt {
        Stmt::LocalVarDecl {
            name: name.to_string(),
            init,
        }
    }

    pub fn if_else(cond: Expr, then_branch: Stmt, else_branch: Option<Stmt>) -> Stmt {
        Stmt::If {
            cond,
            then_branch: Box::new(then_branch),
            else_branch: else_branch.map(Box::new),
        }
    }

    pub fn while_loop(cond: Expr, body: Stmt) -> Stmt {
        Stmt::While {
            cond,
            body: Box::new(body),
        }
    }
}

impl MethodDecl {
    pub fn new(name: &str, params: &[&str], body: Vec<Stmt>) -> MethodDecl {
        MethodDecl {
            name: name.to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
            body,
        }
    }
}

// === Source printing ===

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "class {} {{", self.name)?;
        for field in &self.fields {
            match field.value {
                Some(value) => writeln!(f, "\tint {} = {};", field.name, value)?,
                None => writeln!(f, "\tint {};", field.name)?,
            }
        }
        for method in &self.methods {
            writeln!(f)?;
            write!(f, "\tint {}(", method.name)?;
            for (i, param) in method.params.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "int {}", param)?;
            }
            writeln!(f, ") {{")?;
            for stmt in &method.body {
                write_stmt(f, stmt, 2)?;
            }
            writeln!(f, "\t}}")?;
        }
        write!(f, "}}")
    }
}

fn write_indent(f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
    for _ in 0..depth {
        write!(f, "\t")?;
    }
    Ok(())
}

fn write_stmt(f: &mut fmt::Formatter<'_>, stmt: &Stmt, depth: usize) -> fmt::Result {
    write_indent(f, depth)?;
    match stmt {
        Stmt::Block(stmts) => {
            writeln!(f, "{{")?;
            for s in stmts {
                write_stmt(f, s, depth + 1)?;
            }
            write_indent(f, depth)?;
            writeln!(f, "}}")
        }
        Stmt::LocalVarDecl { name, init: None } => writeln!(f, "int {};", name),
        Stmt::LocalVarDecl {
            name,
            init: Some(init),
        } => writeln!(f, "int {} = {};", name, init),
        Stmt::If {
            cond,
            then_branch,
            else_branch,
        } => {
            writeln!(f, "if ({})", cond)?;
            if else_branch.is_some() && ends_in_open_if(then_branch) {
                // Braces keep our `else` from binding to the inner `if`.
                write_indent(f, depth)?;
                writeln!(f, "{{")?;
                write_stmt(f, then_branch, depth + 1)?;
                write_indent(f, depth)?;
                writeln!(f, "}}")?;
            } else {
                write_stmt(f, then_branch, depth + 1)?;
            }
            if let Some(else_branch) = else_branch {
                write_indent(f, depth)?;
                writeln!(f, "else")?;
                write_stmt(f, else_branch, depth + 1)?;
            }
            Ok(())
        }
        Stmt::While { cond, body } => {
            writeln!(f, "while ({})", cond)?;
            write_stmt(f, body, depth + 1)
        }
        Stmt::Return(expr) => writeln!(f, "return {};", expr),
        Stmt::Expr(expr) => writeln!(f, "{};", expr),
    }
}

/// Whether `stmt`, printed without braces, ends in an `if` with no `else`.
fn ends_in_open_if(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::If {
            else_branch: None, ..
        } => true,
        Stmt::If {
            else_branch: Some(else_branch),
            ..
        } => ends_in_open_if(else_branch),
        Stmt::While { body, .. } => ends_in_open_if(body),
        _ => false,
    }
}

/// Operands that are themselves operators get parentheses, so the printed
/// text never depends on precedence rules to rebuild the same tree.
fn write_operand(f: &mut fmt::Formatter<'_>, expr: &Expr) -> fmt::Result {
    match expr {
        Expr::Binary { .. } | Expr::Assign { .. } | Expr::Unary { .. } => {
            write!(f, "({})", expr)
        }
        Expr::Literal(value) if *value < 0 => write!(f, "({})", value),
        _ => write!(f, "{}", expr),
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(value) => write!(f, "{}", value),
            Expr::Var(name) => write!(f, "{}", name),
            Expr::FieldAccess(name) => write!(f, "this.{}", name),
            Expr::Unary { op, expr } => {
                write!(f, "{}", op.symbol())?;
                write_operand(f, expr)
            }
            Expr::Binary { op, left, right } => {
                write_operand(f, left)?;
                write!(f, " {} ", op.symbol())?;
                write_operand(f, right)
            }
            Expr::Assign { target, value } => write!(f, "{} = {}", target, value),
            Expr::Call { method, args } => {
                write!(f, "{}(", method)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            // Not valid source, so the construct never silently disappears.
            Expr::Unsupported(what) => write!(f, "<unsupported: {}>", what),
        }
    }
}
