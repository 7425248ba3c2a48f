//! Typed AST consumed by code generation
//!
//! Front ends hand over a [`Program`] plus a [`TypeTable`] keyed by
//! [`ExprId`]. [`AstBuilder`] builds both together, assigning fresh ids and
//! recording each expression's static type as it goes.

use crate::types::{Type, TypeTable};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExprId(pub u32);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub id: ExprId,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    Int(i32),
    Float(f32),
    Bool(bool),
    Str(String),
    Var(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Array(Vec<Expr>),
    Index {
        array: Box<Expr>,
        index: Box<Expr>,
    },
    Field {
        target: Box<Expr>,
        field: String,
    },
    New {
        class: String,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod
        )
    }

    pub fn is_ordering(self) -> bool {
        matches!(self, BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge)
    }

    pub fn is_equality(self) -> bool {
        matches!(self, BinaryOp::Eq | BinaryOp::Ne)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

impl Block {
    pub fn new(stmts: Vec<Stmt>) -> Self {
        Self { stmts }
    }

    pub fn ends_with_return(&self) -> bool {
        matches!(self.stmts.last(), Some(Stmt::Return(_)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfBranch {
    pub cond: Expr,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchCase {
    pub value: Expr,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    Block(Block),
    VarDecl {
        name: String,
        ty: Type,
        init: Option<Expr>,
    },
    Expr(Expr),
    Return(Option<Expr>),
    If {
        branches: Vec<IfBranch>,
        else_block: Option<Block>,
    },
    While {
        cond: Expr,
        body: Block,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        update: Option<Expr>,
        body: Block,
    },
    ForRange {
        var: String,
        from: Expr,
        to: Expr,
        body: Block,
    },
    Switch {
        subject: Expr,
        cases: Vec<SwitchCase>,
        default: Option<Block>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: Type,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: Type,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstructorDecl {
    pub params: Vec<Param>,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDecl {
    pub name: String,
    pub fields: Vec<Param>,
    pub methods: Vec<FunctionDecl>,
    pub constructors: Vec<ConstructorDecl>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub functions: Vec<FunctionDecl>,
    pub classes: Vec<ClassDecl>,
}

/// A program together with the types semantic analysis resolved for it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypedProgram {
    pub program: Program,
    pub types: TypeTable,
}

/// Builds expressions with fresh ids and records their static types.
///
/// Result types follow the usual rules: arithmetic on a float operand is
/// float, comparisons and logical operators are bool, indexing yields the
/// array's element type and `new C(..)` yields `C`.
#[derive(Debug, Default)]
pub struct AstBuilder {
    next_id: u32,
    types: TypeTable,
}

impl AstBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expr(&mut self, kind: ExprKind, ty: Type) -> Expr {
        let id = ExprId(self.next_id);
        self.next_id += 1;
        self.types.insert(id, ty);
        Expr { id, kind }
    }

    pub fn type_of(&self, expr: &Expr) -> Type {
        use crate::types::TypeInfo;
        self.types.type_of(expr.id).cloned().unwrap_or(Type::Void)
    }

    pub fn int(&mut self, value: i32) -> Expr {
        self.expr(ExprKind::Int(value), Type::Int)
    }

    pub fn float(&mut self, value: f32) -> Expr {
        self.expr(ExprKind::Float(value), Type::Float)
    }

    pub fn bool(&mut self, value: bool) -> Expr {
        self.expr(ExprKind::Bool(value), Type::Bool)
    }

    pub fn string(&mut self, value: impl Into<String>) -> Expr {
        self.expr(ExprKind::Str(value.into()), Type::String)
    }

    pub fn var(&mut self, name: impl Into<String>, ty: Type) -> Expr {
        self.expr(ExprKind::Var(name.into()), ty)
    }

    pub fn unary(&mut self, op: UnaryOp, operand: Expr) -> Expr {
        let ty = match op {
            UnaryOp::Neg => self.type_of(&operand),
            UnaryOp::Not => Type::Bool,
        };
        self.expr(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            ty,
        )
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        let ty = if op.is_arithmetic() {
            let (l, r) = (self.type_of(&lhs), self.type_of(&rhs));
            if l.is_float() || r.is_float() {
                Type::Float
            } else {
                l
            }
        } else {
            Type::Bool
        };
        self.expr(
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            ty,
        )
    }

    pub fn assign(&mut self, target: Expr, value: Expr) -> Expr {
        let ty = self.type_of(&target);
        self.expr(
            ExprKind::Assign {
                target: Box::new(target),
                value: Box::new(value),
            },
            ty,
        )
    }

    pub fn call(&mut self, callee: Expr, args: Vec<Expr>, ty: Type) -> Expr {
        self.expr(
            ExprKind::Call {
                callee: Box::new(callee),
                args,
            },
            ty,
        )
    }

    /// `name(args)` for a free function returning `ty`.
    pub fn call_fn(&mut self, name: &str, args: Vec<Expr>, ty: Type) -> Expr {
        let callee = self.var(name, Type::Void);
        self.call(callee, args, ty)
    }

    pub fn array(&mut self, elems: Vec<Expr>, elem_ty: Type) -> Expr {
        self.expr(ExprKind::Array(elems), Type::Array(Box::new(elem_ty)))
    }

    pub fn index(&mut self, array: Expr, index: Expr) -> Expr {
        let ty = self
            .type_of(&array)
            .element()
            .cloned()
            .unwrap_or(Type::Void);
        self.expr(
            ExprKind::Index {
                array: Box::new(array),
                index: Box::new(index),
            },
            ty,
        )
    }

    pub fn field(&mut self, target: Expr, field: impl Into<String>, ty: Type) -> Expr {
        self.expr(
            ExprKind::Field {
                target: Box::new(target),
                field: field.into(),
            },
            ty,
        )
    }

    pub fn new_object(&mut self, class: impl Into<String>, args: Vec<Expr>) -> Expr {
        let class = class.into();
        let ty = Type::Class(class.clone());
        self.expr(ExprKind::New { class, args }, ty)
    }

    pub fn types(&self) -> &TypeTable {
        &self.types
    }

    pub fn finish(self) -> TypeTable {
        self.types
    }
}
