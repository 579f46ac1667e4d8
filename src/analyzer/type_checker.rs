// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Type checking visitor
//!
//! Each node evaluates to a [`TypeSet`] of candidate types. Problems are
//! appended to the checker's [`Outcome`] and the walk always continues with
//! the best type that can still be inferred, usually the empty set. An empty
//! set never produces further diagnostics so one mistake is reported once.

use super::environment::{Environment, Frame};
use super::functions::{self, FunctionSignature, InputRule, Parameter, ReturnRule, TypeClass};
use super::operators::{self, OperatorClass};
use super::{CheckError, CheckerConfig, MemberPolicy};
use crate::ast::{
    BinaryOperationNode, EchoPrinter, Expression, ExpressionNode, FunctionCallNode,
    IdentifierNode, IndexNode, LiteralNode, LiteralValue, MemberAccessNode, MethodCallNode, Span,
    TypeOperationNode, TypeOperator, TypeSpecifier, UnaryOperationNode, VariableKind, VariableNode,
    Visitor,
};
use crate::diagnostics::{Diagnostic, DiagnosticCode, Outcome};
use crate::model::{Cardinality, MemberLookup, ModelResolver, SystemType, TypeRef, TypeSet};
use log::{debug, trace};

/// Closure iterations of `repeat()` before giving up on a fixpoint
const MAX_CLOSURE_PASSES: usize = 8;

/// Where a diagnostic points
#[derive(Clone, Copy)]
enum Site<'n> {
    Node(&'n ExpressionNode),
    Ident(&'n IdentifierNode),
    Variable(&'n VariableNode),
    Call(&'n FunctionCallNode),
    Method(&'n MethodCallNode),
    Binary(&'n BinaryOperationNode),
    TypeTest(&'n TypeOperationNode),
}

impl Site<'_> {
    fn span(&self) -> Span {
        match self {
            Site::Node(node) => node.span(),
            Site::Ident(ident) => ident.token.span,
            Site::Variable(variable) => variable.token.span,
            Site::Call(call) => call.name.token.span.join(call.close.span),
            Site::Method(method) => method.object.span().join(method.call.close.span),
            Site::Binary(binary) => binary.left.span().join(binary.right.span()),
            Site::TypeTest(test) => {
                let end = test
                    .type_specifier
                    .parts
                    .last()
                    .map_or(test.token.span, |part| part.token.span);
                test.operand.span().join(end)
            }
        }
    }

    fn source(&self) -> String {
        let mut printer = EchoPrinter::new();
        match self {
            Site::Node(node) => printer.visit_expression(node),
            Site::Ident(ident) => printer.visit_identifier(ident),
            Site::Variable(variable) => printer.visit_variable(variable),
            Site::Call(call) => printer.visit_function_call(call),
            Site::Method(method) => printer.visit_method_call(method),
            Site::Binary(binary) => printer.visit_binary_operation(binary),
            Site::TypeTest(test) => printer.visit_type_operation(test),
        }
        printer.finish().trim_start().to_string()
    }
}

/// Type checking visitor over one expression.
///
/// A checker owns the [`Outcome`] of a single checking pass; create a fresh
/// checker for every expression.
pub struct TypeChecker<'r> {
    resolver: &'r ModelResolver,
    config: CheckerConfig,
    env: Environment,
    outcome: Outcome,
    /// Diagnostics are dropped while positive (speculative passes)
    muted: usize,
}

impl<'r> TypeChecker<'r> {
    /// Create a checker with the default configuration
    pub fn new(resolver: &'r ModelResolver) -> Self {
        Self::with_config(resolver, CheckerConfig::default())
    }

    /// Create a checker with an explicit configuration
    pub fn with_config(resolver: &'r ModelResolver, config: CheckerConfig) -> Self {
        Self {
            resolver,
            config,
            env: Environment::new(),
            outcome: Outcome::new(),
            muted: 0,
        }
    }

    /// Seed the root focus from a type name or an element path such as
    /// `Bundle.entry`, and bind `%context`, `%resource` and `%rootResource`.
    pub fn set_context(&mut self, path: &str) -> Result<TypeSet, CheckError> {
        let context = self.resolver.context_type(path)?;
        let root = path.trim().split('.').next().unwrap_or_default();
        let resource = match self.resolver.resolve_type(root)? {
            Some(declaration) => TypeSet::singleton(TypeRef::named(&declaration.name)),
            None => TypeSet::unknown(Cardinality::Singleton),
        };

        debug!("Checking in context {path}: {context}");
        while self.env.pop_frame().is_some() {}
        self.env.push_frame(Frame::root(context.clone()));
        self.env.define("context", context.clone());
        self.env.define("resource", resource.clone());
        self.env.define("rootResource", resource);
        Ok(context)
    }

    /// Bind an external `%name` variable
    pub fn register_variable(&mut self, name: impl Into<String>, types: TypeSet) {
        self.env.define(name, types);
    }

    /// Add candidate types to the root focus
    pub fn add_input_type(&mut self, types: TypeSet) {
        match self.env.frame_mut() {
            Some(frame) => frame.this.extend(types),
            None => self.env.push_frame(Frame::root(types)),
        }
    }

    /// Check an expression, returning the candidate types of its result
    pub fn visit(&mut self, expression: &Expression) -> TypeSet {
        self.visit_expression(&expression.root)
    }

    /// Diagnostics reported so far
    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    /// Finish the pass
    pub fn into_outcome(self) -> Outcome {
        self.outcome
    }

    fn report(&mut self, site: Site<'_>, diagnostic: Diagnostic) {
        if self.muted > 0 {
            return;
        }
        let diagnostic = diagnostic.at(site.span(), site.source());
        debug!("{diagnostic}");
        self.outcome.push(diagnostic);
    }

    fn error(&mut self, site: Site<'_>, code: DiagnosticCode, message: String) {
        self.report(site, Diagnostic::error(code, message));
    }

    fn warning(&mut self, site: Site<'_>, code: DiagnosticCode, message: String) {
        self.report(site, Diagnostic::warning(code, message));
    }

    /// Visit a sub-expression whose `defineVariable` bindings must not leak
    fn visit_scoped(&mut self, node: &ExpressionNode) -> TypeSet {
        let mark = self.env.mark();
        let result = self.visit_expression(node);
        self.env.restore(mark);
        result
    }

    /// Visit an argument once per input item
    fn visit_lambda(&mut self, node: &ExpressionNode, frame: Frame) -> TypeSet {
        self.env.push_frame(frame);
        let result = self.visit_scoped(node);
        self.env.pop_frame();
        result
    }

    /// Whether some candidate belongs to `class`. Empty and unknown sets
    /// conform since they were either reported already or cannot be judged.
    fn conforms(&self, types: &TypeSet, class: TypeClass) -> bool {
        if class == TypeClass::Any || types.is_empty() || types.has_unknown() {
            return true;
        }
        types
            .types()
            .filter_map(|ty| self.resolver.system_type(ty))
            .any(|system| class.admits(system))
    }

    /// Known system types of the candidates and whether any were unknown
    fn system_types(&self, types: &TypeSet) -> (Vec<SystemType>, bool) {
        let mut systems = Vec::new();
        let opaque = types.has_unknown();
        for ty in types.types().filter(|ty| !ty.is_unknown()) {
            if let Some(system) = self.resolver.system_type(ty) {
                if !systems.contains(&system) {
                    systems.push(system);
                }
            }
        }
        (systems, opaque)
    }

    fn require_single(&mut self, site: Site<'_>, types: &TypeSet, what: &str, always: bool) {
        if (always || self.config.strict_cardinality) && !types.is_empty() && !types.is_singleton()
        {
            self.error(
                site,
                DiagnosticCode::SingletonRequired,
                format!("{what} must be a single item, found {types}"),
            );
        }
    }

    /// Navigate to `name` on every candidate of `receiver`
    fn navigate(&mut self, receiver: &TypeSet, name: &str, site: Site<'_>) -> TypeSet {
        if receiver.is_empty() {
            return TypeSet::empty();
        }

        let mut result = TypeSet::empty().with_cardinality(receiver.cardinality());
        let mut missing: Vec<&TypeRef> = Vec::new();
        for ty in receiver.types() {
            match self.resolver.children_of(ty, name) {
                MemberLookup::Found(children) => result.extend(children),
                MemberLookup::Missing => missing.push(ty),
            }
        }
        trace!("{receiver} . {name} -> {result}");

        let total = receiver.len();
        if missing.len() == total {
            self.error(
                site,
                DiagnosticCode::UndefinedMember,
                format!("'{name}' is not defined on {receiver}"),
            );
            return TypeSet::empty();
        }
        if !missing.is_empty() {
            let message = format!(
                "'{name}' is defined on {} of {total} possible types (not on {})",
                total - missing.len(),
                missing
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            match self.config.member_policy {
                MemberPolicy::Tolerant => {
                    self.warning(site, DiagnosticCode::PartialMember, message)
                }
                MemberPolicy::Strict => self.error(site, DiagnosticCode::PartialMember, message),
            }
        }
        result
    }

    /// Whether a root identifier names a type of the focus (`Patient.name`
    /// in the context of Patient, `Resource.id` for any resource)
    fn names_focus_type(&self, focus: &TypeSet, name: &str) -> Option<TypeSet> {
        if !name.starts_with(|c: char| c.is_ascii_uppercase()) {
            return None;
        }
        let matching: Vec<TypeRef> = focus
            .types()
            .filter(|ty| match ty {
                TypeRef::Named(ty_name) => self.resolver.is_subtype(ty_name, name),
                _ => false,
            })
            .cloned()
            .collect();
        if !matching.is_empty() {
            return Some(TypeSet::from_types(matching, focus.cardinality()));
        }
        if focus.has_unknown() {
            let declaration = self.resolver.resolve_type(name).ok().flatten()?;
            return declaration
                .is_resource()
                .then(|| TypeSet::of(TypeRef::named(&declaration.name), focus.cardinality()));
        }
        None
    }

    /// Resolve a written type specifier
    fn resolve_specifier(&mut self, spec: &TypeSpecifier, site: Site<'_>) -> Option<TypeRef> {
        let resolved = self.resolver.type_specifier(spec.namespace(), spec.name());
        if resolved.is_none() {
            self.error(
                site,
                DiagnosticCode::InvalidTypeSpecifier,
                format!("unknown type '{}'", spec.qualified_name()),
            );
        }
        resolved
    }

    /// Narrow `input` to `target`, warning when no candidate can match
    fn filter_type(&mut self, input: &TypeSet, target: &TypeRef, site: Site<'_>) -> TypeSet {
        if input.is_empty() {
            return TypeSet::empty();
        }
        let possible = input.has_unknown()
            || input
                .types()
                .any(|ty| self.resolver.is_compatible(ty, target));
        if !possible {
            self.warning(
                site,
                DiagnosticCode::ImpossibleTypeFilter,
                format!("{input} can never be of type {target}"),
            );
            return TypeSet::empty();
        }
        TypeSet::of(target.clone(), input.cardinality())
    }

    fn check_input(&mut self, signature: &FunctionSignature, input: &TypeSet, site: Site<'_>) {
        let class = match signature.input {
            InputRule::Collection => return,
            InputRule::Singleton(class) => {
                let what = format!("input of {}()", signature.name);
                self.require_single(site, input, &what, false);
                class
            }
            InputRule::Items(class) => class,
        };
        if !self.conforms(input, class) {
            self.error(
                site,
                DiagnosticCode::InvalidInputType,
                format!("{}() expects {class} input, found {input}", signature.name),
            );
        }
    }

    fn check_argument(
        &mut self,
        signature: &FunctionSignature,
        index: usize,
        class: TypeClass,
        types: &TypeSet,
        argument: &ExpressionNode,
    ) {
        if !self.conforms(types, class) {
            self.error(
                Site::Node(argument),
                DiagnosticCode::InvalidArgumentTypes,
                format!(
                    "argument {} of {}() must be {class}, found {types}",
                    index + 1,
                    signature.name
                ),
            );
        }
    }

    /// Literal arguments that can be validated statically
    fn check_literal_argument(&mut self, name: &str, index: usize, argument: &ExpressionNode) {
        let Some(text) = argument.as_string_literal() else {
            return;
        };
        if index == 0 && functions::takes_regex(name) {
            if let Err(err) = regex::Regex::new(text) {
                self.error(
                    Site::Node(argument),
                    DiagnosticCode::InvalidRegex,
                    format!("invalid regular expression: {err}"),
                );
            }
        }
    }

    fn invoke(&mut self, call: &FunctionCallNode, input: TypeSet, site: Site<'_>) -> TypeSet {
        let name = call.name.name.as_str();
        let Some(signature) = functions::lookup(name) else {
            self.error(
                Site::Ident(&call.name),
                DiagnosticCode::UnknownFunction,
                format!("unknown function '{name}'"),
            );
            return TypeSet::empty();
        };

        let count = call.arguments.len();
        if !signature.accepts_arity(count) {
            self.error(
                site,
                DiagnosticCode::InvalidArity,
                format!(
                    "{name}() takes {} arguments, found {count}",
                    signature.arity_text()
                ),
            );
            return TypeSet::empty();
        }

        self.check_input(signature, &input, site);

        match signature.returns {
            ReturnRule::Aggregate => return self.aggregate(signature, call, &input),
            ReturnRule::Closure => return self.closure(signature, call, &input),
            ReturnRule::Extension => return self.extension(call, &input, site),
            _ => {}
        }
        if name == "defineVariable" {
            return self.define_variable(signature, call, input);
        }

        let mut arguments: Vec<TypeSet> = Vec::with_capacity(count);
        let mut specifier: Option<TypeRef> = None;
        for (index, argument) in call.arguments.iter().enumerate() {
            let types = match signature.parameter(index) {
                Some(Parameter::Value(class)) => {
                    let types = self.visit_scoped(argument);
                    self.check_argument(signature, index, class, &types, argument);
                    self.check_literal_argument(name, index, argument);
                    types
                }
                Some(Parameter::Lambda(class)) => {
                    let types = self.visit_lambda(argument, Frame::iteration(&input));
                    self.check_argument(signature, index, class, &types, argument);
                    types
                }
                Some(Parameter::TypeSpecifier) => match argument.as_type_specifier() {
                    Some(spec) => {
                        specifier = self.resolve_specifier(&spec, Site::Node(argument));
                        specifier.clone().map(TypeSet::singleton).unwrap_or_default()
                    }
                    None => {
                        self.error(
                            Site::Node(argument),
                            DiagnosticCode::InvalidTypeSpecifier,
                            format!("argument of {name}() must be a type name"),
                        );
                        TypeSet::empty()
                    }
                },
                None => TypeSet::empty(),
            };
            arguments.push(types);
        }

        match signature.returns {
            ReturnRule::Fixed(ty, cardinality) => {
                if name == "is" {
                    if let Some(target) = &specifier {
                        self.filter_type(&input, target, site);
                    }
                }
                TypeSet::of(ty, cardinality)
            }
            ReturnRule::Input => input,
            ReturnRule::InputItem => input.as_singleton(),
            ReturnRule::InputCollection => input.as_collection(),
            ReturnRule::InputValue => self.value_types(&input),
            ReturnRule::Projection => arguments
                .into_iter()
                .next()
                .unwrap_or_default()
                .as_collection(),
            ReturnRule::Combine => {
                let other = arguments.first().cloned().unwrap_or_default();
                input.union(&other).as_collection()
            }
            ReturnRule::Conditional => {
                let mut branches = arguments.into_iter().skip(1);
                let mut result = branches.next().unwrap_or_default();
                if let Some(otherwise) = branches.next() {
                    result.extend(otherwise);
                }
                result
            }
            ReturnRule::Specifier => match &specifier {
                Some(target) => self.filter_type(&input, target, site),
                None => TypeSet::empty(),
            },
            ReturnRule::SpecifierCollection => match &specifier {
                Some(target) => self.filter_type(&input, target, site).as_collection(),
                None => TypeSet::empty(),
            },
            ReturnRule::Unknown(cardinality) => {
                if matches!(name, "children" | "descendants") && !input.is_empty() {
                    self.report(
                        site,
                        Diagnostic::information(
                            DiagnosticCode::UntypedResult,
                            format!("result of {name}() is not typed statically"),
                        ),
                    );
                }
                TypeSet::unknown(cardinality)
            }
            ReturnRule::Aggregate | ReturnRule::Closure | ReturnRule::Extension => {
                TypeSet::unknown(Cardinality::Collection)
            }
        }
    }

    /// Candidates reduced to the system types they behave as
    fn value_types(&self, input: &TypeSet) -> TypeSet {
        let types = input.types().map(|ty| match self.resolver.system_type(ty) {
            Some(system) => TypeRef::System(system),
            None => ty.clone(),
        });
        TypeSet::from_types(types, Cardinality::Singleton)
    }

    fn define_variable(
        &mut self,
        signature: &FunctionSignature,
        call: &FunctionCallNode,
        input: TypeSet,
    ) -> TypeSet {
        let Some(name_argument) = call.arguments.first() else {
            return input;
        };
        let value = match call.arguments.get(1) {
            Some(argument) => self.visit_lambda(argument, Frame::iteration(&input)),
            None => input.clone(),
        };

        match name_argument.as_string_literal() {
            Some(variable) if self.env.variable(variable).is_some() => self.error(
                Site::Node(name_argument),
                DiagnosticCode::InvalidArgumentTypes,
                format!("variable %{variable} is already defined"),
            ),
            Some(variable) => {
                debug!("Defining %{variable}: {value}");
                self.env.define(variable, value);
            }
            None => {
                let types = self.visit_scoped(name_argument);
                self.check_argument(signature, 0, TypeClass::String, &types, name_argument);
                self.error(
                    Site::Node(name_argument),
                    DiagnosticCode::InvalidArgumentTypes,
                    "variable name must be a string literal".to_string(),
                );
            }
        }
        input
    }

    fn aggregate(
        &mut self,
        signature: &FunctionSignature,
        call: &FunctionCallNode,
        input: &TypeSet,
    ) -> TypeSet {
        let initial = call.arguments.get(1).map(|init| self.visit_scoped(init));
        let total = initial
            .clone()
            .unwrap_or_else(|| TypeSet::unknown(Cardinality::Singleton));

        let mut frame = Frame::iteration(input);
        frame.total = Some(total);
        let result = match call.arguments.first() {
            Some(lambda) => {
                let types = self.visit_lambda(lambda, frame);
                self.check_argument(signature, 0, TypeClass::Any, &types, lambda);
                types
            }
            None => TypeSet::empty(),
        };
        match initial {
            Some(initial) => result.union(&initial),
            None => result,
        }
    }

    /// `repeat()`: project until no new candidate types appear
    fn closure(
        &mut self,
        signature: &FunctionSignature,
        call: &FunctionCallNode,
        input: &TypeSet,
    ) -> TypeSet {
        let Some(lambda) = call.arguments.first() else {
            return TypeSet::empty();
        };
        let mut result = self.visit_lambda(lambda, Frame::iteration(input));
        self.check_argument(signature, 0, TypeClass::Any, &result, lambda);

        // Later passes only discover types; their diagnostics would repeat
        // or stem from types that never reach the lambda at runtime.
        self.muted += 1;
        for _ in 0..MAX_CLOSURE_PASSES {
            let next = self.visit_lambda(lambda, Frame::iteration(&result));
            if next.types().all(|ty| result.contains(ty)) {
                break;
            }
            result.extend(next);
        }
        self.muted -= 1;
        result.as_collection()
    }

    fn extension(&mut self, call: &FunctionCallNode, input: &TypeSet, site: Site<'_>) -> TypeSet {
        let Some(argument) = call.arguments.first() else {
            return TypeSet::empty();
        };
        let url_types = self.visit_scoped(argument);

        if !input.is_empty()
            && input.types().all(|ty| {
                matches!(
                    self.resolver.children_of(ty, "extension"),
                    MemberLookup::Missing
                )
            })
        {
            self.error(
                site,
                DiagnosticCode::InvalidInputType,
                format!("{input} cannot carry extensions"),
            );
            return TypeSet::empty();
        }

        let Some(url) = argument.as_string_literal() else {
            if !self.conforms(&url_types, TypeClass::String) {
                self.error(
                    Site::Node(argument),
                    DiagnosticCode::InvalidArgumentTypes,
                    format!("extension url must be a String, found {url_types}"),
                );
            }
            return TypeSet::collection(TypeRef::named("Extension"));
        };

        if let Err(err) = url::Url::parse(url) {
            self.error(
                Site::Node(argument),
                DiagnosticCode::InvalidExtensionUrl,
                format!("'{url}' is not a valid extension url: {err}"),
            );
            return TypeSet::empty();
        }

        match self.resolver.extension_type(url) {
            Some(extension) => {
                debug!("Extension {url} resolved to {extension}");
                TypeSet::collection(extension)
            }
            None => {
                self.warning(
                    Site::Node(argument),
                    DiagnosticCode::UnresolvedExtension,
                    format!("extension '{url}' could not be resolved"),
                );
                TypeSet::unknown(Cardinality::Collection)
            }
        }
    }

    fn arithmetic(
        &mut self,
        node: &BinaryOperationNode,
        left: &TypeSet,
        right: &TypeSet,
        site: Site<'_>,
    ) -> TypeSet {
        if left.is_empty() || right.is_empty() {
            return TypeSet::empty();
        }
        let (left_systems, left_opaque) = self.system_types(left);
        let (right_systems, right_opaque) = self.system_types(right);

        let mut result = TypeSet::empty();
        for l in &left_systems {
            for r in &right_systems {
                if let Some(ty) = operators::arithmetic_result(node.operator, *l, *r) {
                    result.insert(ty);
                }
            }
        }
        if left_opaque || right_opaque {
            result.insert(TypeRef::Unknown);
        } else if result.is_empty() {
            self.error(
                site,
                DiagnosticCode::InvalidOperandTypes,
                format!(
                    "operator '{}' cannot be applied to {left} and {right}",
                    node.operator
                ),
            );
        }
        result
    }

    fn ordering(
        &mut self,
        node: &BinaryOperationNode,
        left: &TypeSet,
        right: &TypeSet,
        site: Site<'_>,
    ) {
        if left.is_empty() || right.is_empty() {
            return;
        }
        let (left_systems, left_opaque) = self.system_types(left);
        let (right_systems, right_opaque) = self.system_types(right);
        if left_opaque || right_opaque {
            return;
        }
        let comparable = left_systems.iter().any(|l| {
            right_systems
                .iter()
                .any(|r| operators::ordering_applies(*l, *r))
        });
        if !comparable {
            self.error(
                site,
                DiagnosticCode::InvalidOperandTypes,
                format!(
                    "operator '{}' cannot compare {left} with {right}",
                    node.operator
                ),
            );
        }
    }

    /// Equality and membership need some candidate pair that could hold
    /// equal values. Empty and unknown operands are not judged.
    fn equality(
        &mut self,
        node: &BinaryOperationNode,
        left: &TypeSet,
        right: &TypeSet,
        site: Site<'_>,
    ) {
        if left.is_empty() || right.is_empty() || left.has_unknown() || right.has_unknown() {
            return;
        }
        let (left_systems, _) = self.system_types(left);
        let (right_systems, _) = self.system_types(right);
        let convertible = left_systems
            .iter()
            .any(|l| right_systems.iter().any(|r| l.is_comparable_with(*r)));
        let related = left
            .types()
            .any(|l| right.types().any(|r| self.resolver.is_compatible(l, r)));
        if !convertible && !related {
            self.error(
                site,
                DiagnosticCode::InvalidOperandTypes,
                format!(
                    "operator '{}' cannot match {left} against {right}",
                    node.operator
                ),
            );
        }
    }

    fn boolean_operand(
        &mut self,
        node: &BinaryOperationNode,
        operand: &ExpressionNode,
        types: &TypeSet,
    ) {
        if !self.conforms(types, TypeClass::Boolean) {
            self.error(
                Site::Node(operand),
                DiagnosticCode::InvalidOperandTypes,
                format!("operand of '{}' must be Boolean, found {types}", node.operator),
            );
        }
    }
}

impl Visitor for TypeChecker<'_> {
    type Result = TypeSet;

    fn visit_literal(&mut self, node: &LiteralNode) -> TypeSet {
        let ty = match &node.value {
            LiteralValue::Empty => return TypeSet::empty(),
            LiteralValue::Boolean(_) => SystemType::Boolean,
            LiteralValue::String(_) => SystemType::String,
            LiteralValue::Integer(_) => SystemType::Integer,
            LiteralValue::Long(_) => SystemType::Long,
            LiteralValue::Decimal(_) => SystemType::Decimal,
            LiteralValue::Date(_) => SystemType::Date,
            LiteralValue::DateTime(_) => SystemType::DateTime,
            LiteralValue::Time(_) => SystemType::Time,
            LiteralValue::Quantity { .. } => SystemType::Quantity,
        };
        TypeSet::singleton(ty)
    }

    fn visit_identifier(&mut self, node: &IdentifierNode) -> TypeSet {
        let focus = self.env.this();
        if let Some(types) = self.names_focus_type(&focus, &node.name) {
            trace!("{} names the focus type", node.name);
            return types;
        }
        self.navigate(&focus, &node.name, Site::Ident(node))
    }

    fn visit_variable(&mut self, node: &VariableNode) -> TypeSet {
        let found = match node.kind {
            VariableKind::This => Some(self.env.this()),
            VariableKind::Index => self
                .env
                .has_index()
                .then(|| TypeSet::singleton(SystemType::Integer)),
            VariableKind::Total => self.env.total(),
            VariableKind::External => self.env.variable(&node.name),
        };
        match found {
            Some(types) => types,
            None => {
                let sigil = if node.kind == VariableKind::External { "%" } else { "$" };
                self.error(
                    Site::Variable(node),
                    DiagnosticCode::UndefinedVariable,
                    format!("variable {sigil}{} is not defined here", node.name),
                );
                TypeSet::empty()
            }
        }
    }

    fn visit_member_access(&mut self, node: &MemberAccessNode) -> TypeSet {
        let receiver = self.visit_expression(&node.object);
        self.navigate(&receiver, &node.member.name, Site::Ident(&node.member))
    }

    fn visit_function_call(&mut self, node: &FunctionCallNode) -> TypeSet {
        let input = self.env.this();
        self.invoke(node, input, Site::Call(node))
    }

    fn visit_method_call(&mut self, node: &MethodCallNode) -> TypeSet {
        let input = self.visit_expression(&node.object);
        self.invoke(&node.call, input, Site::Method(node))
    }

    fn visit_index(&mut self, node: &IndexNode) -> TypeSet {
        let collection = self.visit_expression(&node.object);
        let index = self.visit_scoped(&node.index);
        self.require_single(Site::Node(&node.index), &index, "index", true);
        collection.as_singleton()
    }

    fn visit_unary_operation(&mut self, node: &UnaryOperationNode) -> TypeSet {
        let operand = self.visit_expression(&node.operand);
        if operand.is_empty() {
            return operand;
        }
        let (systems, opaque) = self.system_types(&operand);
        let mut result = TypeSet::from_types(
            systems
                .iter()
                .filter_map(|ty| operators::unary_result(node.operator, *ty))
                .map(TypeRef::System),
            Cardinality::Singleton,
        );
        if opaque {
            result.insert(TypeRef::Unknown);
        } else if result.is_empty() {
            self.error(
                Site::Node(&node.operand),
                DiagnosticCode::InvalidOperandTypes,
                format!("operator '{}' cannot be applied to {operand}", node.operator),
            );
        }
        result
    }

    fn visit_binary_operation(&mut self, node: &BinaryOperationNode) -> TypeSet {
        let left = self.visit_scoped(&node.left);
        let right = self.visit_scoped(&node.right);
        let site = Site::Binary(node);

        match operators::classify(node.operator) {
            OperatorClass::Arithmetic => {
                self.require_single(Site::Node(&node.left), &left, "operand", false);
                self.require_single(Site::Node(&node.right), &right, "operand", false);
                self.arithmetic(node, &left, &right, site)
            }
            OperatorClass::Concatenate => {
                for (operand, types) in [(&node.left, &left), (&node.right, &right)] {
                    if !self.conforms(types, TypeClass::String) {
                        self.error(
                            Site::Node(operand),
                            DiagnosticCode::InvalidOperandTypes,
                            format!("operand of '&' must be String, found {types}"),
                        );
                    }
                }
                TypeSet::singleton(SystemType::String)
            }
            OperatorClass::Equality => {
                self.equality(node, &left, &right, site);
                TypeSet::singleton(SystemType::Boolean)
            }
            OperatorClass::Ordering => {
                self.require_single(Site::Node(&node.left), &left, "operand", false);
                self.require_single(Site::Node(&node.right), &right, "operand", false);
                self.ordering(node, &left, &right, site);
                TypeSet::singleton(SystemType::Boolean)
            }
            OperatorClass::Logical => {
                self.boolean_operand(node, &node.left, &left);
                self.boolean_operand(node, &node.right, &right);
                TypeSet::singleton(SystemType::Boolean)
            }
            OperatorClass::Union => left.union(&right).as_collection(),
            OperatorClass::Membership => {
                self.require_single(Site::Node(&node.left), &left, "left operand of 'in'", true);
                self.equality(node, &left, &right, site);
                TypeSet::singleton(SystemType::Boolean)
            }
            OperatorClass::Containership => {
                self.require_single(
                    Site::Node(&node.right),
                    &right,
                    "right operand of 'contains'",
                    true,
                );
                self.equality(node, &left, &right, site);
                TypeSet::singleton(SystemType::Boolean)
            }
        }
    }

    fn visit_type_operation(&mut self, node: &TypeOperationNode) -> TypeSet {
        let operand = self.visit_expression(&node.operand);
        let site = Site::TypeTest(node);

        if node.operator == TypeOperator::Is {
            self.require_single(Site::Node(&node.operand), &operand, "operand of 'is'", false);
        }
        let Some(target) = self.resolve_specifier(&node.type_specifier, site) else {
            return match node.operator {
                TypeOperator::Is => TypeSet::singleton(SystemType::Boolean),
                TypeOperator::As => TypeSet::empty(),
            };
        };
        let narrowed = self.filter_type(&operand, &target, site);
        match node.operator {
            TypeOperator::Is => TypeSet::singleton(SystemType::Boolean),
            TypeOperator::As => narrowed,
        }
    }
}
