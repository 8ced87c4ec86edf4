// src/errors/sema.rs
//! Semantic analysis errors (E2xxx) and warnings (W2xxx).

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum SemanticError {
    #[error("use of undeclared identifier '{name}'")]
    #[diagnostic(code(E2001))]
    UndeclaredIdentifier { name: String },

    #[error("use of undeclared label '{name}'")]
    #[diagnostic(code(E2002))]
    UndeclaredLabel { name: String },

    #[error("use of undeclared error value '{name}'")]
    #[diagnostic(code(E2003))]
    UndeclaredErrorValue { name: String },

    #[error("redefinition of '{name}'")]
    #[diagnostic(code(E2004))]
    Redefinition { name: String },

    #[error("redefinition of error '{name}'")]
    #[diagnostic(code(E2005))]
    RedefinitionOfError { name: String },

    #[error("redeclaration of variable '{name}'")]
    #[diagnostic(code(E2006))]
    RedeclaredVariable { name: String },

    #[error("variable shadows type '{type_name}'")]
    #[diagnostic(code(E2007))]
    VariableShadowsType { type_name: String },

    #[error("expected type '{expected}', got '{found}'")]
    #[diagnostic(code(E2008))]
    TypeMismatch { expected: String, found: String },

    #[error("incompatible types: '{left}' and '{right}'")]
    #[diagnostic(code(E2009))]
    IncompatibleTypes { left: String, right: String },

    #[error("{kind} value {value} cannot be implicitly casted to type '{ty}'")]
    #[diagnostic(code(E2010))]
    NumLitNotCastable {
        /// "integer" or "float".
        kind: &'static str,
        value: String,
        ty: String,
    },

    #[error("number literal too large to be represented in any type")]
    #[diagnostic(code(E2011))]
    NumberTooLarge,

    #[error("value cannot be represented in any integer type")]
    #[diagnostic(code(E2012))]
    ValueNotRepresentable,

    #[error("division by zero")]
    #[diagnostic(code(E2013))]
    DivisionByZero,

    #[error("shift amount is too large for type '{ty}'")]
    #[diagnostic(code(E2014))]
    ShiftTooLarge { ty: String },

    #[error("invalid cast from type '{from}' to '{to}'")]
    #[diagnostic(code(E2015))]
    InvalidCast { from: String, to: String },

    #[error("too many error values to fit in '{ty}'")]
    #[diagnostic(code(E2016))]
    TooManyErrorValues { ty: String },

    #[error("{kind} has infinite size")]
    #[diagnostic(code(E2017))]
    InfiniteSize {
        /// "struct" or "enum".
        kind: &'static str,
    },

    #[error("invalid assignment target")]
    #[diagnostic(code(E2018))]
    InvalidAssignmentTarget,

    #[error("invalid addressof target")]
    #[diagnostic(code(E2019))]
    InvalidAddressOfTarget,

    #[error("cannot assign to constant")]
    #[diagnostic(code(E2020))]
    CannotAssignToConstant,

    #[error("operator not allowed for type '{ty}'")]
    #[diagnostic(code(E2021))]
    OperatorNotAllowed { ty: String },

    #[error("unreachable code")]
    #[diagnostic(code(E2022))]
    UnreachableCode,

    #[error("'break' expression outside loop")]
    #[diagnostic(code(E2023))]
    BreakOutsideLoop,

    #[error("'continue' expression outside loop")]
    #[diagnostic(code(E2024))]
    ContinueOutsideLoop,

    #[error("return expression outside function definition")]
    #[diagnostic(code(E2025))]
    ReturnOutsideFunction,

    #[error("expected type, found expression")]
    #[diagnostic(code(E2026))]
    ExpectedTypeFoundExpression,

    #[error("expected expression, found type")]
    #[diagnostic(code(E2027))]
    ExpectedExpressionFoundType,

    #[error("statement ignores error value")]
    #[diagnostic(code(E2028))]
    StatementIgnoresError,

    #[error("unable to resolve constant expression")]
    #[diagnostic(code(E2029))]
    UnableToResolveConstant,

    #[error("unable to infer variable type")]
    #[diagnostic(code(E2030))]
    UnableToInferType,

    #[error("unable to determine null type")]
    #[diagnostic(code(E2031))]
    UnableToDetermineNullType,

    #[error("variables must be initialized")]
    #[diagnostic(code(E2032))]
    VariablesMustBeInitialized,

    #[error("variable initialization is unreachable")]
    #[diagnostic(code(E2033))]
    VariableInitUnreachable,

    #[error("variable of type 'type' must be constant")]
    #[diagnostic(code(E2034))]
    TypeVariableMustBeConstant,

    #[error("variable of type 'unreachable' not allowed")]
    #[diagnostic(code(E2035))]
    UnreachableVariableNotAllowed,

    #[error("parameter of type 'unreachable' not allowed")]
    #[diagnostic(code(E2036))]
    UnreachableParamNotAllowed,

    #[error("array of unreachable not allowed")]
    #[diagnostic(code(E2037))]
    ArrayOfUnreachable,

    #[error("pointer to unreachable not allowed")]
    #[diagnostic(code(E2038))]
    PointerToUnreachable,

    #[error("unable to wrap unreachable in {wrapper} type")]
    #[diagnostic(code(E2039))]
    CannotWrapUnreachable {
        /// "optional" or "error".
        wrapper: &'static str,
    },

    #[error("no member named '{field}' in '{ty}'")]
    #[diagnostic(code(E2040))]
    NoMemberNamed { field: String, ty: String },

    #[error("no function named '{name}' in '{ty}'")]
    #[diagnostic(code(E2041))]
    NoFunctionNamed { name: String, ty: String },

    #[error("member reference base type not struct or enum")]
    #[diagnostic(code(E2042))]
    MemberRefBaseNotContainer,

    #[error("type '{ty}' does not support field access")]
    #[diagnostic(code(E2043))]
    FieldAccessNotSupported { ty: String },

    #[error("slice of non-array type '{ty}'")]
    #[diagnostic(code(E2044))]
    SliceOfNonArray { ty: String },

    #[error("array access of non-array type '{ty}'")]
    #[diagnostic(code(E2045))]
    ArrayAccessOfNonArray { ty: String },

    #[error("iteration over non array type '{ty}'")]
    #[diagnostic(code(E2046))]
    IterationOverNonArray { ty: String },

    #[error("type '{ty}' not a function")]
    #[diagnostic(code(E2047))]
    NotAFunction { ty: String },

    #[error("invalid builtin function: '{name}'")]
    #[diagnostic(code(E2048))]
    InvalidBuiltin { name: String },

    #[error("expected {expected} arguments, got {found}")]
    #[diagnostic(code(E2049))]
    WrongArgCount { expected: usize, found: usize },

    #[error("expected at least {expected} arguments, got {found}")]
    #[diagnostic(code(E2050))]
    WrongArgCountAtLeast { expected: usize, found: usize },

    #[error("cast expression expects exactly one parameter")]
    #[diagnostic(code(E2051))]
    CastArgCount,

    #[error("enum values accept only one parameter")]
    #[diagnostic(code(E2052))]
    EnumValueParamCount,

    #[error("enum value '{enum_name}.{field}' requires parameter of type '{ty}'")]
    #[diagnostic(code(E2053))]
    EnumValueRequiresParam {
        enum_name: String,
        field: String,
        ty: String,
    },

    #[error("duplicate field")]
    #[diagnostic(code(E2054))]
    DuplicateField,

    #[error("missing field: '{name}'")]
    #[diagnostic(code(E2055))]
    MissingField { name: String },

    #[error("type '{ty}' does not support {syntax} initialization syntax")]
    #[diagnostic(code(E2056))]
    InitSyntaxNotSupported {
        ty: String,
        /// "struct" or "array".
        syntax: &'static str,
    },

    #[error("void expression expects no arguments")]
    #[diagnostic(code(E2057))]
    VoidExpectsNoArguments,

    #[error("unreachable expression expects no arguments")]
    #[diagnostic(code(E2058))]
    UnreachableExpectsNoArguments,

    #[error("expected optional type, got '{found}'")]
    #[diagnostic(code(E2059))]
    ExpectedOptionalType { found: String },

    #[error("expected error type, got '{found}'")]
    #[diagnostic(code(E2060))]
    ExpectedErrorType { found: String },

    #[error("array size {size} is negative")]
    #[diagnostic(code(E2061))]
    NegativeArraySize { size: String },

    #[error("invalid negation type: '{ty}'")]
    #[diagnostic(code(E2062))]
    InvalidNegationType { ty: String },

    #[error("invalid binary not type: '{ty}'")]
    #[diagnostic(code(E2063))]
    InvalidBinNotType { ty: String },

    #[error("indirection requires pointer operand ('{ty}' invalid)")]
    #[diagnostic(code(E2064))]
    DereferenceNonPointer { ty: String },

    #[error("unable to get address of type '{ty}'")]
    #[diagnostic(code(E2065))]
    AddressOfLiteral { ty: String },

    #[error("global variable initializer requires constant expression")]
    #[diagnostic(code(E2066))]
    GlobalInitializerNotConstant,

    #[error("string concatenation requires constant expression")]
    #[diagnostic(code(E2067))]
    StrCatNotConstant,

    #[error("switch on unreachable expression not allowed")]
    #[diagnostic(code(E2068))]
    SwitchOnUnreachable,

    #[error("multiple else prongs in switch expression")]
    #[diagnostic(code(E2069))]
    MultipleElseProngs,

    #[error("switch must handle all possibilities")]
    #[diagnostic(code(E2070))]
    SwitchNotExhaustive,

    #[error("variadic arguments only allowed in extern functions")]
    #[diagnostic(code(E2071))]
    VariadicOnlyExtern,

    #[error("@{name} valid only in c_import blocks")]
    #[diagnostic(code(E2073))]
    BuiltinOutsideCImport { name: &'static str },

    #[error("@{name} requires constant expression")]
    #[diagnostic(code(E2074))]
    BuiltinRequiresConstant { name: &'static str },

    #[error("C import failed")]
    #[diagnostic(code(E2075))]
    CImportFailed,

    #[error("unable to find '{path}'")]
    #[diagnostic(code(E2076))]
    ImportNotFound { path: String },

    #[error("import of {kind} '{name}' overrides existing definition")]
    #[diagnostic(code(E2077))]
    ImportOverridesDefinition {
        /// "function", "variable", "type" or "error".
        kind: &'static str,
        name: String,
    },

    #[error("expected integer type, got '{found}'")]
    #[diagnostic(code(E2078))]
    ExpectedIntegerType { found: String },

    #[error("expected pointer argument, got '{found}'")]
    #[diagnostic(code(E2079))]
    ExpectedPointerArgument { found: String },

    #[error("misaligned memcpy, '{dest}' has alignment {dest_align}, '{src}' has alignment {src_align}")]
    #[diagnostic(code(E2080))]
    MisalignedMemcpy {
        dest: String,
        dest_align: u64,
        src: String,
        src_align: u64,
    },

    #[error("misaligned result pointer: '{found}' has alignment {found_align}, '{ty}' has alignment {align}")]
    #[diagnostic(code(E2081))]
    MisalignedOverflowResult {
        found: String,
        found_align: u64,
        ty: String,
        align: u64,
    },

    #[error("no size available for type '{ty}'")]
    #[diagnostic(code(E2082))]
    NoSizeAvailable { ty: String },

    #[error("no min value available for type '{ty}'")]
    #[diagnostic(code(E2083))]
    NoMinValue { ty: String },

    #[error("no max value available for type '{ty}'")]
    #[diagnostic(code(E2084))]
    NoMaxValue { ty: String },

    #[error("no value count available for type '{ty}'")]
    #[diagnostic(code(E2085))]
    NoMemberCount { ty: String },

    #[error("type '{ty}' not eligible for @typeof")]
    #[diagnostic(code(E2086))]
    TypeofNotEligible { ty: String },
}

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum SemanticWarning {
    #[error("label '{name}' defined but not used")]
    #[diagnostic(code(W2001))]
    UnusedLabel { name: String },
}
