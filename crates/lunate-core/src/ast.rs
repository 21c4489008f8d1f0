//! Typed canonical AST.
//!
//! Deserialized from normalized ESTree JSON. The normalizer has already
//! rewritten every `type` outside the canonical set to `Unsupported`, so the
//! enums below are closed and every consumer can match exhaustively.

use lunate_ir::{LiteralValue, SourceLoc};
use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Loc {
    pub start: Position,
    pub end: Position,
}

/// Start position of an optional span, in IR terms.
pub fn start_of(loc: &Option<Loc>) -> Option<SourceLoc> {
    loc.map(|l| SourceLoc {
        line: l.start.line,
        column: l.start.column,
    })
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Program {
    pub body: Vec<Statement>,
    #[serde(default)]
    pub directives: Vec<String>,
    #[serde(default)]
    pub loc: Option<Loc>,
}

// ============================================================================
// Statements
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum Statement {
    BlockStatement(BlockStatement),
    VariableDeclaration(VariableDeclaration),
    ExpressionStatement(ExpressionStatement),
    ReturnStatement(ReturnStatement),
    IfStatement(IfStatement),
    WhileStatement(WhileStatement),
    DoWhileStatement(DoWhileStatement),
    ForStatement(ForStatement),
    ForOfStatement(ForOfStatement),
    ForInStatement(ForInStatement),
    SwitchStatement(SwitchStatement),
    TryStatement(TryStatement),
    ThrowStatement(ThrowStatement),
    BreakStatement(JumpStatement),
    ContinueStatement(JumpStatement),
    ClassDeclaration(ClassDeclaration),
    FunctionDeclaration(Function),
    EmptyStatement(Empty),
    Unsupported(Unsupported),
}

impl Statement {
    pub fn type_name(&self) -> &str {
        match self {
            Statement::BlockStatement(_) => "BlockStatement",
            Statement::VariableDeclaration(_) => "VariableDeclaration",
            Statement::ExpressionStatement(_) => "ExpressionStatement",
            Statement::ReturnStatement(_) => "ReturnStatement",
            Statement::IfStatement(_) => "IfStatement",
            Statement::WhileStatement(_) => "WhileStatement",
            Statement::DoWhileStatement(_) => "DoWhileStatement",
            Statement::ForStatement(_) => "ForStatement",
            Statement::ForOfStatement(_) => "ForOfStatement",
            Statement::ForInStatement(_) => "ForInStatement",
            Statement::SwitchStatement(_) => "SwitchStatement",
            Statement::TryStatement(_) => "TryStatement",
            Statement::ThrowStatement(_) => "ThrowStatement",
            Statement::BreakStatement(_) => "BreakStatement",
            Statement::ContinueStatement(_) => "ContinueStatement",
            Statement::ClassDeclaration(_) => "ClassDeclaration",
            Statement::FunctionDeclaration(_) => "FunctionDeclaration",
            Statement::EmptyStatement(_) => "EmptyStatement",
            Statement::Unsupported(u) => &u.node_type,
        }
    }

    pub fn loc(&self) -> Option<SourceLoc> {
        let loc = match self {
            Statement::BlockStatement(s) => &s.loc,
            Statement::VariableDeclaration(s) => &s.loc,
            Statement::ExpressionStatement(s) => &s.loc,
            Statement::ReturnStatement(s) => &s.loc,
            Statement::IfStatement(s) => &s.loc,
            Statement::WhileStatement(s) => &s.loc,
            Statement::DoWhileStatement(s) => &s.loc,
            Statement::ForStatement(s) => &s.loc,
            Statement::ForOfStatement(s) => &s.loc,
            Statement::ForInStatement(s) => &s.loc,
            Statement::SwitchStatement(s) => &s.loc,
            Statement::TryStatement(s) => &s.loc,
            Statement::ThrowStatement(s) => &s.loc,
            Statement::BreakStatement(s) | Statement::ContinueStatement(s) => &s.loc,
            Statement::ClassDeclaration(s) => &s.loc,
            Statement::FunctionDeclaration(s) => &s.loc,
            Statement::EmptyStatement(s) => &s.loc,
            Statement::Unsupported(s) => &s.loc,
        };
        start_of(loc)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BlockStatement {
    pub body: Vec<Statement>,
    #[serde(default)]
    pub loc: Option<Loc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableKind {
    Var,
    Let,
    Const,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VariableDeclaration {
    pub kind: VariableKind,
    pub declarations: Vec<VariableDeclarator>,
    #[serde(default)]
    pub loc: Option<Loc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VariableDeclarator {
    pub id: Pattern,
    #[serde(default)]
    pub init: Option<Expression>,
    #[serde(default)]
    pub loc: Option<Loc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExpressionStatement {
    pub expression: Expression,
    #[serde(default)]
    pub loc: Option<Loc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReturnStatement {
    #[serde(default)]
    pub argument: Option<Expression>,
    #[serde(default)]
    pub loc: Option<Loc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IfStatement {
    pub test: Expression,
    pub consequent: Box<Statement>,
    #[serde(default)]
    pub alternate: Option<Box<Statement>>,
    #[serde(default)]
    pub loc: Option<Loc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WhileStatement {
    pub test: Expression,
    pub body: Box<Statement>,
    #[serde(default)]
    pub loc: Option<Loc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DoWhileStatement {
    pub body: Box<Statement>,
    pub test: Expression,
    #[serde(default)]
    pub loc: Option<Loc>,
}

/// Initializer slot of a C-style `for`.
#[derive(Debug, Clone, PartialEq)]
pub enum ForInit {
    Declaration(VariableDeclaration),
    Expression(Expression),
}

/// Binding slot of `for .. of` / `for .. in`.
#[derive(Debug, Clone, PartialEq)]
pub enum ForBinding {
    Declaration(VariableDeclaration),
    Pattern(Pattern),
}

fn is_declaration(value: &Value) -> bool {
    value.get("type").and_then(Value::as_str) == Some("VariableDeclaration")
}

impl<'de> Deserialize<'de> for ForInit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        if is_declaration(&value) {
            VariableDeclaration::deserialize(value)
                .map(ForInit::Declaration)
                .map_err(de::Error::custom)
        } else {
            Expression::deserialize(value)
                .map(ForInit::Expression)
                .map_err(de::Error::custom)
        }
    }
}

impl<'de> Deserialize<'de> for ForBinding {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        if is_declaration(&value) {
            VariableDeclaration::deserialize(value)
                .map(ForBinding::Declaration)
                .map_err(de::Error::custom)
        } else {
            Pattern::deserialize(value)
                .map(ForBinding::Pattern)
                .map_err(de::Error::custom)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ForStatement {
    #[serde(default)]
    pub init: Option<ForInit>,
    #[serde(default)]
    pub test: Option<Expression>,
    #[serde(default)]
    pub update: Option<Expression>,
    pub body: Box<Statement>,
    #[serde(default)]
    pub loc: Option<Loc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ForOfStatement {
    pub left: ForBinding,
    pub right: Expression,
    pub body: Box<Statement>,
    #[serde(default, rename = "await")]
    pub is_await: bool,
    #[serde(default)]
    pub loc: Option<Loc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ForInStatement {
    pub left: ForBinding,
    pub right: Expression,
    pub body: Box<Statement>,
    #[serde(default)]
    pub loc: Option<Loc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SwitchStatement {
    pub discriminant: Expression,
    pub cases: Vec<SwitchCase>,
    #[serde(default)]
    pub loc: Option<Loc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SwitchCase {
    /// `None` for `default:`.
    #[serde(default)]
    pub test: Option<Expression>,
    pub consequent: Vec<Statement>,
    #[serde(default)]
    pub loc: Option<Loc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TryStatement {
    pub block: BlockStatement,
    #[serde(default)]
    pub handler: Option<CatchClause>,
    #[serde(default)]
    pub finalizer: Option<BlockStatement>,
    #[serde(default)]
    pub loc: Option<Loc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CatchClause {
    #[serde(default)]
    pub param: Option<Pattern>,
    pub body: BlockStatement,
    #[serde(default)]
    pub loc: Option<Loc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ThrowStatement {
    pub argument: Expression,
    #[serde(default)]
    pub loc: Option<Loc>,
}

/// `break` or `continue`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JumpStatement {
    #[serde(default)]
    pub label: Option<Identifier>,
    #[serde(default)]
    pub loc: Option<Loc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassDeclaration {
    #[serde(default)]
    pub id: Option<Identifier>,
    #[serde(default)]
    pub super_class: Option<Expression>,
    pub body: ClassBody,
    #[serde(default)]
    pub loc: Option<Loc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClassBody {
    pub body: Vec<ClassMember>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ClassMember {
    MethodDefinition(MethodDefinition),
    PropertyDefinition(PropertyDefinition),
    Unsupported(Unsupported),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MethodKind {
    Constructor,
    Method,
    Get,
    Set,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MethodDefinition {
    pub key: Expression,
    #[serde(default)]
    pub computed: bool,
    pub kind: MethodKind,
    #[serde(default, rename = "static")]
    pub is_static: bool,
    pub value: Function,
    #[serde(default)]
    pub loc: Option<Loc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PropertyDefinition {
    pub key: Expression,
    #[serde(default)]
    pub value: Option<Expression>,
    #[serde(default)]
    pub computed: bool,
    #[serde(default, rename = "static")]
    pub is_static: bool,
    #[serde(default)]
    pub loc: Option<Loc>,
}

/// Function declarations, function expressions and arrow functions.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Function {
    #[serde(default)]
    pub id: Option<Identifier>,
    #[serde(default)]
    pub params: Vec<Pattern>,
    pub body: FunctionBody,
    #[serde(default)]
    pub generator: bool,
    #[serde(default, rename = "async")]
    pub is_async: bool,
    #[serde(default)]
    pub loc: Option<Loc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionBody {
    Block(BlockStatement),
    /// Concise arrow body.
    Expression(Box<Expression>),
}

impl<'de> Deserialize<'de> for FunctionBody {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        if value.get("type").and_then(Value::as_str) == Some("BlockStatement") {
            BlockStatement::deserialize(value)
                .map(FunctionBody::Block)
                .map_err(de::Error::custom)
        } else {
            Expression::deserialize(value)
                .map(|e| FunctionBody::Expression(Box::new(e)))
                .map_err(de::Error::custom)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Empty {
    #[serde(default)]
    pub loc: Option<Loc>,
}

/// A construct outside the canonical set, kept so it can be reported.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unsupported {
    pub node_type: String,
    #[serde(default)]
    pub loc: Option<Loc>,
}

// ============================================================================
// Expressions
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum Expression {
    Identifier(Identifier),
    Literal(Literal),
    TemplateLiteral(TemplateLiteral),
    ArrayExpression(ArrayExpression),
    ObjectExpression(ObjectExpression),
    FunctionExpression(Function),
    ArrowFunctionExpression(Function),
    UnaryExpression(UnaryExpression),
    UpdateExpression(UpdateExpression),
    BinaryExpression(BinaryExpression),
    LogicalExpression(BinaryExpression),
    AssignmentExpression(AssignmentExpression),
    ConditionalExpression(ConditionalExpression),
    CallExpression(CallExpression),
    NewExpression(NewExpression),
    MemberExpression(MemberExpression),
    ChainExpression(ChainExpression),
    ThisExpression(Empty),
    Super(Empty),
    SpreadElement(SpreadElement),
    Unsupported(Unsupported),
}

impl Expression {
    pub fn type_name(&self) -> &str {
        match self {
            Expression::Identifier(_) => "Identifier",
            Expression::Literal(_) => "Literal",
            Expression::TemplateLiteral(_) => "TemplateLiteral",
            Expression::ArrayExpression(_) => "ArrayExpression",
            Expression::ObjectExpression(_) => "ObjectExpression",
            Expression::FunctionExpression(_) => "FunctionExpression",
            Expression::ArrowFunctionExpression(_) => "ArrowFunctionExpression",
            Expression::UnaryExpression(_) => "UnaryExpression",
            Expression::UpdateExpression(_) => "UpdateExpression",
            Expression::BinaryExpression(_) => "BinaryExpression",
            Expression::LogicalExpression(_) => "LogicalExpression",
            Expression::AssignmentExpression(_) => "AssignmentExpression",
            Expression::ConditionalExpression(_) => "ConditionalExpression",
            Expression::CallExpression(_) => "CallExpression",
            Expression::NewExpression(_) => "NewExpression",
            Expression::MemberExpression(_) => "MemberExpression",
            Expression::ChainExpression(_) => "ChainExpression",
            Expression::ThisExpression(_) => "ThisExpression",
            Expression::Super(_) => "Super",
            Expression::SpreadElement(_) => "SpreadElement",
            Expression::Unsupported(u) => &u.node_type,
        }
    }

    pub fn loc(&self) -> Option<SourceLoc> {
        let loc = match self {
            Expression::Identifier(e) => &e.loc,
            Expression::Literal(e) => &e.loc,
            Expression::TemplateLiteral(e) => &e.loc,
            Expression::ArrayExpression(e) => &e.loc,
            Expression::ObjectExpression(e) => &e.loc,
            Expression::FunctionExpression(e) | Expression::ArrowFunctionExpression(e) => &e.loc,
            Expression::UnaryExpression(e) => &e.loc,
            Expression::UpdateExpression(e) => &e.loc,
            Expression::BinaryExpression(e) | Expression::LogicalExpression(e) => &e.loc,
            Expression::AssignmentExpression(e) => &e.loc,
            Expression::ConditionalExpression(e) => &e.loc,
            Expression::CallExpression(e) => &e.loc,
            Expression::NewExpression(e) => &e.loc,
            Expression::MemberExpression(e) => &e.loc,
            Expression::ChainExpression(e) => &e.loc,
            Expression::ThisExpression(e) | Expression::Super(e) => &e.loc,
            Expression::SpreadElement(e) => &e.loc,
            Expression::Unsupported(e) => &e.loc,
        };
        start_of(loc)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Identifier {
    pub name: String,
    #[serde(default)]
    pub loc: Option<Loc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Literal {
    pub value: LiteralValue,
    #[serde(default)]
    pub raw: Option<String>,
    #[serde(default)]
    pub loc: Option<Loc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TemplateLiteral {
    pub quasis: Vec<TemplateElement>,
    pub expressions: Vec<Expression>,
    #[serde(default)]
    pub loc: Option<Loc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TemplateElement {
    pub value: TemplateValue,
    #[serde(default)]
    pub tail: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TemplateValue {
    pub raw: String,
    #[serde(default)]
    pub cooked: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ArrayExpression {
    /// `None` marks a hole.
    pub elements: Vec<Option<Expression>>,
    #[serde(default)]
    pub loc: Option<Loc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ObjectExpression {
    pub properties: Vec<ObjectMember>,
    #[serde(default)]
    pub loc: Option<Loc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ObjectMember {
    Property(Property),
    SpreadElement(SpreadElement),
    Unsupported(Unsupported),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    Init,
    Get,
    Set,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Property {
    pub key: Expression,
    pub value: Expression,
    #[serde(default)]
    pub computed: bool,
    pub kind: PropertyKind,
    #[serde(default)]
    pub method: bool,
    #[serde(default)]
    pub shorthand: bool,
    #[serde(default)]
    pub loc: Option<Loc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UnaryExpression {
    pub operator: String,
    pub argument: Box<Expression>,
    #[serde(default)]
    pub loc: Option<Loc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UpdateExpression {
    pub operator: String,
    pub argument: Box<Expression>,
    pub prefix: bool,
    #[serde(default)]
    pub loc: Option<Loc>,
}

/// Binary and logical expressions share a shape.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BinaryExpression {
    pub operator: String,
    pub left: Box<Expression>,
    pub right: Box<Expression>,
    #[serde(default)]
    pub loc: Option<Loc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AssignmentExpression {
    pub operator: String,
    pub left: Box<Pattern>,
    pub right: Box<Expression>,
    #[serde(default)]
    pub loc: Option<Loc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConditionalExpression {
    pub test: Box<Expression>,
    pub consequent: Box<Expression>,
    pub alternate: Box<Expression>,
    #[serde(default)]
    pub loc: Option<Loc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CallExpression {
    pub callee: Box<Expression>,
    pub arguments: Vec<Expression>,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub loc: Option<Loc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewExpression {
    pub callee: Box<Expression>,
    pub arguments: Vec<Expression>,
    #[serde(default)]
    pub loc: Option<Loc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MemberExpression {
    pub object: Box<Expression>,
    pub property: Box<Expression>,
    #[serde(default)]
    pub computed: bool,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub loc: Option<Loc>,
}

impl MemberExpression {
    /// Property name of a non-computed access.
    pub fn static_name(&self) -> Option<&str> {
        match (&*self.property, self.computed) {
            (Expression::Identifier(id), false) => Some(&id.name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChainExpression {
    pub expression: Box<Expression>,
    #[serde(default)]
    pub loc: Option<Loc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SpreadElement {
    pub argument: Box<Expression>,
    #[serde(default)]
    pub loc: Option<Loc>,
}

// ============================================================================
// Patterns
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum Pattern {
    Identifier(Identifier),
    ObjectPattern(ObjectPattern),
    ArrayPattern(ArrayPattern),
    AssignmentPattern(AssignmentPattern),
    RestElement(RestElement),
    MemberExpression(MemberExpression),
    Unsupported(Unsupported),
}

impl Pattern {
    pub fn type_name(&self) -> &str {
        match self {
            Pattern::Identifier(_) => "Identifier",
            Pattern::ObjectPattern(_) => "ObjectPattern",
            Pattern::ArrayPattern(_) => "ArrayPattern",
            Pattern::AssignmentPattern(_) => "AssignmentPattern",
            Pattern::RestElement(_) => "RestElement",
            Pattern::MemberExpression(_) => "MemberExpression",
            Pattern::Unsupported(u) => &u.node_type,
        }
    }

    pub fn loc(&self) -> Option<SourceLoc> {
        let loc = match self {
            Pattern::Identifier(p) => &p.loc,
            Pattern::ObjectPattern(p) => &p.loc,
            Pattern::ArrayPattern(p) => &p.loc,
            Pattern::AssignmentPattern(p) => &p.loc,
            Pattern::RestElement(p) => &p.loc,
            Pattern::MemberExpression(p) => &p.loc,
            Pattern::Unsupported(p) => &p.loc,
        };
        start_of(loc)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ObjectPattern {
    pub properties: Vec<PatternMember>,
    #[serde(default)]
    pub loc: Option<Loc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum PatternMember {
    Property(PatternProperty),
    RestElement(RestElement),
    Unsupported(Unsupported),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PatternProperty {
    pub key: Expression,
    pub value: Pattern,
    #[serde(default)]
    pub computed: bool,
    #[serde(default)]
    pub shorthand: bool,
    #[serde(default)]
    pub loc: Option<Loc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ArrayPattern {
    /// `None` marks a hole.
    pub elements: Vec<Option<Pattern>>,
    #[serde(default)]
    pub loc: Option<Loc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AssignmentPattern {
    pub left: Box<Pattern>,
    pub right: Box<Expression>,
    #[serde(default)]
    pub loc: Option<Loc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RestElement {
    pub argument: Box<Pattern>,
    #[serde(default)]
    pub loc: Option<Loc>,
}

// ============================================================================
// Traversal
// ============================================================================

/// Read-only traversal over the canonical AST.
///
/// Override a `visit_*` method to intercept a node; call the matching `walk_*`
/// function from the override to keep descending.
pub trait Visitor {
    fn visit_statement(&mut self, stmt: &Statement) {
        walk_statement(self, stmt);
    }

    fn visit_expression(&mut self, expr: &Expression) {
        walk_expression(self, expr);
    }

    fn visit_pattern(&mut self, pattern: &Pattern) {
        walk_pattern(self, pattern);
    }

    fn visit_function(&mut self, function: &Function) {
        walk_function(self, function);
    }
}

pub fn walk_statement<V: Visitor + ?Sized>(v: &mut V, stmt: &Statement) {
    match stmt {
        Statement::BlockStatement(block) => block.body.iter().for_each(|s| v.visit_statement(s)),
        Statement::VariableDeclaration(decl) => walk_declaration(v, decl),
        Statement::ExpressionStatement(s) => v.visit_expression(&s.expression),
        Statement::ReturnStatement(s) => {
            if let Some(arg) = &s.argument {
                v.visit_expression(arg);
            }
        }
        Statement::IfStatement(s) => {
            v.visit_expression(&s.test);
            v.visit_statement(&s.consequent);
            if let Some(alt) = &s.alternate {
                v.visit_statement(alt);
            }
        }
        Statement::WhileStatement(s) => {
            v.visit_expression(&s.test);
            v.visit_statement(&s.body);
        }
        Statement::DoWhileStatement(s) => {
            v.visit_statement(&s.body);
            v.visit_expression(&s.test);
        }
        Statement::ForStatement(s) => {
            match &s.init {
                Some(ForInit::Declaration(decl)) => walk_declaration(v, decl),
                Some(ForInit::Expression(e)) => v.visit_expression(e),
                None => {}
            }
            if let Some(test) = &s.test {
                v.visit_expression(test);
            }
            if let Some(update) = &s.update {
                v.visit_expression(update);
            }
            v.visit_statement(&s.body);
        }
        Statement::ForOfStatement(s) => {
            walk_binding(v, &s.left);
            v.visit_expression(&s.right);
            v.visit_statement(&s.body);
        }
        Statement::ForInStatement(s) => {
            walk_binding(v, &s.left);
            v.visit_expression(&s.right);
            v.visit_statement(&s.body);
        }
        Statement::SwitchStatement(s) => {
            v.visit_expression(&s.discriminant);
            for case in &s.cases {
                if let Some(test) = &case.test {
                    v.visit_expression(test);
                }
                case.consequent.iter().for_each(|c| v.visit_statement(c));
            }
        }
        Statement::TryStatement(s) => {
            s.block.body.iter().for_each(|c| v.visit_statement(c));
            if let Some(handler) = &s.handler {
                if let Some(param) = &handler.param {
                    v.visit_pattern(param);
                }
                handler.body.body.iter().for_each(|c| v.visit_statement(c));
            }
            if let Some(finalizer) = &s.finalizer {
                finalizer.body.iter().for_each(|c| v.visit_statement(c));
            }
        }
        Statement::ThrowStatement(s) => v.visit_expression(&s.argument),
        Statement::ClassDeclaration(class) => {
            if let Some(sup) = &class.super_class {
                v.visit_expression(sup);
            }
            for member in &class.body.body {
                match member {
                    ClassMember::MethodDefinition(m) => {
                        v.visit_expression(&m.key);
                        v.visit_function(&m.value);
                    }
                    ClassMember::PropertyDefinition(p) => {
                        v.visit_expression(&p.key);
                        if let Some(value) = &p.value {
                            v.visit_expression(value);
                        }
                    }
                    ClassMember::Unsupported(_) => {}
                }
            }
        }
        Statement::FunctionDeclaration(f) => v.visit_function(f),
        Statement::BreakStatement(_)
        | Statement::ContinueStatement(_)
        | Statement::EmptyStatement(_)
        | Statement::Unsupported(_) => {}
    }
}

fn walk_declaration<V: Visitor + ?Sized>(v: &mut V, decl: &VariableDeclaration) {
    for d in &decl.declarations {
        v.visit_pattern(&d.id);
        if let Some(init) = &d.init {
            v.visit_expression(init);
        }
    }
}

fn walk_binding<V: Visitor + ?Sized>(v: &mut V, binding: &ForBinding) {
    match binding {
        ForBinding::Declaration(decl) => walk_declaration(v, decl),
        ForBinding::Pattern(p) => v.visit_pattern(p),
    }
}

pub fn walk_function<V: Visitor + ?Sized>(v: &mut V, function: &Function) {
    function.params.iter().for_each(|p| v.visit_pattern(p));
    match &function.body {
        FunctionBody::Block(block) => block.body.iter().for_each(|s| v.visit_statement(s)),
        FunctionBody::Expression(e) => v.visit_expression(e),
    }
}

pub fn walk_expression<V: Visitor + ?Sized>(v: &mut V, expr: &Expression) {
    match expr {
        Expression::TemplateLiteral(t) => t.expressions.iter().for_each(|e| v.visit_expression(e)),
        Expression::ArrayExpression(a) => a.elements.iter().flatten().for_each(|e| v.visit_expression(e)),
        Expression::ObjectExpression(o) => {
            for member in &o.properties {
                match member {
                    ObjectMember::Property(p) => {
                        v.visit_expression(&p.key);
                        v.visit_expression(&p.value);
                    }
                    ObjectMember::SpreadElement(s) => v.visit_expression(&s.argument),
                    ObjectMember::Unsupported(_) => {}
                }
            }
        }
        Expression::FunctionExpression(f) | Expression::ArrowFunctionExpression(f) => {
            v.visit_function(f)
        }
        Expression::UnaryExpression(u) => v.visit_expression(&u.argument),
        Expression::UpdateExpression(u) => v.visit_expression(&u.argument),
        Expression::BinaryExpression(b) | Expression::LogicalExpression(b) => {
            v.visit_expression(&b.left);
            v.visit_expression(&b.right);
        }
        Expression::AssignmentExpression(a) => {
            v.visit_pattern(&a.left);
            v.visit_expression(&a.right);
        }
        Expression::ConditionalExpression(c) => {
            v.visit_expression(&c.test);
            v.visit_expression(&c.consequent);
            v.visit_expression(&c.alternate);
        }
        Expression::CallExpression(c) => {
            v.visit_expression(&c.callee);
            c.arguments.iter().for_each(|a| v.visit_expression(a));
        }
        Expression::NewExpression(n) => {
            v.visit_expression(&n.callee);
            n.arguments.iter().for_each(|a| v.visit_expression(a));
        }
        Expression::MemberExpression(m) => {
            v.visit_expression(&m.object);
            v.visit_expression(&m.property);
        }
        Expression::ChainExpression(c) => v.visit_expression(&c.expression),
        Expression::SpreadElement(s) => v.visit_expression(&s.argument),
        Expression::Identifier(_)
        | Expression::Literal(_)
        | Expression::ThisExpression(_)
        | Expression::Super(_)
        | Expression::Unsupported(_) => {}
    }
}

pub fn walk_pattern<V: Visitor + ?Sized>(v: &mut V, pattern: &Pattern) {
    match pattern {
        Pattern::ObjectPattern(o) => {
            for member in &o.properties {
                match member {
                    PatternMember::Property(p) => {
                        v.visit_expression(&p.key);
                        v.visit_pattern(&p.value);
                    }
                    PatternMember::RestElement(r) => v.visit_pattern(&r.argument),
                    PatternMember::Unsupported(_) => {}
                }
            }
        }
        Pattern::ArrayPattern(a) => a.elements.iter().flatten().for_each(|p| v.visit_pattern(p)),
        Pattern::AssignmentPattern(a) => {
            v.visit_pattern(&a.left);
            v.visit_expression(&a.right);
        }
        Pattern::RestElement(r) => v.visit_pattern(&r.argument),
        Pattern::MemberExpression(m) => {
            v.visit_expression(&m.object);
            v.visit_expression(&m.property);
        }
        Pattern::Identifier(_) | Pattern::Unsupported(_) => {}
    }
}
