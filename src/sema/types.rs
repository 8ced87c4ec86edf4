// src/sema/types.rs
//
// Interned type universe using TypeId handles for O(1) equality.
//
// - TypeId: u32 handle to an interned type (Copy, trivial Eq/Hash)
// - TypeRegistry: per-compilation storage with automatic deduplication of
//   derived types (pointer, array, slice, optional, error union, function)
// - Container: mutable resolution record for a struct or enum declaration,
//   carrying the cycle-guard flags

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::ast::{ContainerKind, NodeId, Symbol};
use crate::sema::entities::{FileId, FnId};

/// Handle to an interned type in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(u32);

impl TypeId {
    /// The invalid sentinel is always at index 0.
    pub const INVALID: TypeId = TypeId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn is_invalid(self) -> bool {
        self == TypeId::INVALID
    }
}

/// Handle to a struct or enum resolution record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContainerId(u32);

impl ContainerId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Opaque handle the backend attaches to a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendTypeRef(pub u32);

/// Opaque handle the backend attaches to a type's debug info.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendDebugRef(pub u32);

pub type TypeIdVec = SmallVec<[TypeId; 4]>;

/// Structural function signature; interned like any derived type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FnSig {
    pub params: TypeIdVec,
    pub return_type: TypeId,
    pub is_var_args: bool,
    pub is_extern: bool,
    pub is_naked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKind {
    Invalid,
    /// The type of types.
    MetaType,
    Void,
    Bool,
    Unreachable,
    Int {
        signed: bool,
        bits: u64,
        /// isize/usize are distinct named types even when a fixed-width
        /// integer has the same width.
        pointer_sized: bool,
    },
    Float {
        bits: u64,
    },
    Pointer {
        child: TypeId,
        is_const: bool,
    },
    Array {
        child: TypeId,
        len: u64,
    },
    /// Two-field struct `{ ptr: &child, len: isize }`. The const slice is a
    /// distinct analyzer type that reuses the non-const backend layout.
    Slice {
        child: TypeId,
        is_const: bool,
    },
    NumLitInt,
    NumLitFloat,
    UndefLit,
    Optional {
        child: TypeId,
    },
    ErrorUnion {
        child: TypeId,
    },
    PureError,
    Struct(ContainerId),
    Enum(ContainerId),
    Fn(FnSig),
}

#[derive(Debug)]
pub struct TypeEntry {
    pub kind: TypeKind,
    pub name: String,
    pub size_bits: u64,
    pub align_bits: u64,
    pub backend: Option<BackendTypeRef>,
    pub backend_debug: Option<BackendDebugRef>,
}

#[derive(Debug, Clone)]
pub struct ContainerField {
    pub name: Symbol,
    pub ty: TypeId,
    pub src_index: u32,
    /// -1 when the field generates no storage (void or invalid).
    pub gen_index: i32,
}

/// Resolution record for a struct or enum declaration. The cycle-guard flags
/// live here rather than on the interned type entry.
#[derive(Debug)]
pub struct Container {
    pub kind: ContainerKind,
    pub name: Symbol,
    pub decl_node: NodeId,
    pub file: FileId,
    pub type_id: TypeId,
    pub fields: Vec<ContainerField>,
    pub methods: rustc_hash::FxHashMap<Symbol, FnId>,
    pub embedded_in_current: bool,
    pub reported_infinite_err: bool,
    pub complete: bool,
    pub is_invalid: bool,
    /// Enum tag type, set once the enum is resolved.
    pub tag_type: Option<TypeId>,
}

/// Intern key for derived types. Primitives and containers are never
/// re-requested by structure, so they stay out of this map.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum TypeKey {
    Pointer { child: TypeId, is_const: bool },
    Array { child: TypeId, len: u64 },
    Slice { child: TypeId, is_const: bool },
    Optional { child: TypeId },
    ErrorUnion { child: TypeId },
    Fn(FnSig),
}

/// Pre-interned primitives for O(1) access.
#[derive(Debug, Clone, Copy)]
pub struct PrimitiveTypes {
    pub invalid: TypeId,
    pub metatype: TypeId,
    pub void: TypeId,
    pub bool_: TypeId,
    pub unreachable: TypeId,
    pub i8: TypeId,
    pub i16: TypeId,
    pub i32: TypeId,
    pub i64: TypeId,
    pub u8: TypeId,
    pub u16: TypeId,
    pub u32: TypeId,
    pub u64: TypeId,
    pub isize: TypeId,
    pub usize: TypeId,
    pub f32: TypeId,
    pub f64: TypeId,
    pub num_lit_int: TypeId,
    pub num_lit_float: TypeId,
    pub undef_lit: TypeId,
    pub pure_error: TypeId,
}

#[derive(Debug)]
pub struct TypeRegistry {
    entries: Vec<TypeEntry>,
    intern: HashMap<TypeKey, TypeId>,
    containers: Vec<Container>,
    pub prim: PrimitiveTypes,
    pub pointer_bits: u64,
    /// Width of the pure-error tag; patched once error values are counted.
    err_tag_bits: u64,
}

impl TypeRegistry {
    pub fn new(pointer_bits: u64) -> Self {
        let mut reg = Self {
            entries: Vec::with_capacity(64),
            intern: HashMap::new(),
            containers: Vec::new(),
            prim: PrimitiveTypes {
                invalid: TypeId(0),
                metatype: TypeId(0),
                void: TypeId(0),
                bool_: TypeId(0),
                unreachable: TypeId(0),
                i8: TypeId(0),
                i16: TypeId(0),
                i32: TypeId(0),
                i64: TypeId(0),
                u8: TypeId(0),
                u16: TypeId(0),
                u32: TypeId(0),
                u64: TypeId(0),
                isize: TypeId(0),
                usize: TypeId(0),
                f32: TypeId(0),
                f64: TypeId(0),
                num_lit_int: TypeId(0),
                num_lit_float: TypeId(0),
                undef_lit: TypeId(0),
                pure_error: TypeId(0),
            },
            pointer_bits,
            err_tag_bits: 8,
        };

        // Invalid must be first so TypeId::INVALID holds.
        reg.prim.invalid = reg.push(TypeKind::Invalid, "(invalid)", 0, 0);
        debug_assert!(reg.prim.invalid.is_invalid());

        reg.prim.metatype = reg.push(TypeKind::MetaType, "type", 0, 0);
        reg.prim.void = reg.push(TypeKind::Void, "void", 0, 0);
        reg.prim.bool_ = reg.push(TypeKind::Bool, "bool", 8, 8);
        reg.prim.unreachable = reg.push(TypeKind::Unreachable, "unreachable", 0, 0);
        for (signed, bits) in [
            (true, 8),
            (true, 16),
            (true, 32),
            (true, 64),
            (false, 8),
            (false, 16),
            (false, 32),
            (false, 64),
        ] {
            let name = format!("{}{}", if signed { 'i' } else { 'u' }, bits);
            let id = reg.push(
                TypeKind::Int {
                    signed,
                    bits,
                    pointer_sized: false,
                },
                &name,
                bits,
                bits,
            );
            match (signed, bits) {
                (true, 8) => reg.prim.i8 = id,
                (true, 16) => reg.prim.i16 = id,
                (true, 32) => reg.prim.i32 = id,
                (true, 64) => reg.prim.i64 = id,
                (false, 8) => reg.prim.u8 = id,
                (false, 16) => reg.prim.u16 = id,
                (false, 32) => reg.prim.u32 = id,
                (false, 64) => reg.prim.u64 = id,
                _ => unreachable!(),
            }
        }
        reg.prim.isize = reg.push(
            TypeKind::Int {
                signed: true,
                bits: pointer_bits,
                pointer_sized: true,
            },
            "isize",
            pointer_bits,
            pointer_bits,
        );
        reg.prim.usize = reg.push(
            TypeKind::Int {
                signed: false,
                bits: pointer_bits,
                pointer_sized: true,
            },
            "usize",
            pointer_bits,
            pointer_bits,
        );
        reg.prim.f32 = reg.push(TypeKind::Float { bits: 32 }, "f32", 32, 32);
        reg.prim.f64 = reg.push(TypeKind::Float { bits: 64 }, "f64", 64, 64);
        reg.prim.num_lit_int = reg.push(TypeKind::NumLitInt, "(integer literal)", 0, 0);
        reg.prim.num_lit_float = reg.push(TypeKind::NumLitFloat, "(float literal)", 0, 0);
        reg.prim.undef_lit = reg.push(TypeKind::UndefLit, "(undefined)", 0, 0);
        // Partially complete; sized once error values are counted.
        reg.prim.pure_error = reg.push(TypeKind::PureError, "error", 8, 8);

        reg
    }

    fn push(&mut self, kind: TypeKind, name: &str, size_bits: u64, align_bits: u64) -> TypeId {
        let id = TypeId(self.entries.len() as u32);
        self.entries.push(TypeEntry {
            kind,
            name: name.to_string(),
            size_bits,
            align_bits,
            backend: None,
            backend_debug: None,
        });
        id
    }

    pub fn entry(&self, id: TypeId) -> &TypeEntry {
        &self.entries[id.index()]
    }

    pub fn entry_mut(&mut self, id: TypeId) -> &mut TypeEntry {
        &mut self.entries[id.index()]
    }

    pub fn kind(&self, id: TypeId) -> &TypeKind {
        &self.entries[id.index()].kind
    }

    pub fn name(&self, id: TypeId) -> &str {
        &self.entries[id.index()].name
    }

    pub fn size_bits(&self, id: TypeId) -> u64 {
        self.entries[id.index()].size_bits
    }

    pub fn align_bits(&self, id: TypeId) -> u64 {
        self.entries[id.index()].align_bits
    }

    pub fn is_invalid(&self, id: TypeId) -> bool {
        id.is_invalid()
    }

    /// Size the pure-error tag once the number of declared error values is
    /// known. Must run before any declaration is resolved.
    pub fn size_pure_error_tag(&mut self, error_value_count: u32) {
        let bits = bits_needed_for_unsigned(error_value_count as u64);
        self.err_tag_bits = bits;
        let id = self.prim.pure_error;
        self.entries[id.index()].size_bits = bits;
        self.entries[id.index()].align_bits = bits;
    }

    pub fn err_tag_type(&self) -> TypeId {
        self.int_type(false, self.err_tag_bits)
    }

    // ========================================================================
    // Primitive lookups
    // ========================================================================

    pub fn int_type(&self, signed: bool, bits: u64) -> TypeId {
        match (signed, bits) {
            (true, 8) => self.prim.i8,
            (true, 16) => self.prim.i16,
            (true, 32) => self.prim.i32,
            (true, 64) => self.prim.i64,
            (false, 8) => self.prim.u8,
            (false, 16) => self.prim.u16,
            (false, 32) => self.prim.u32,
            (false, 64) => self.prim.u64,
            _ => panic!("no integer type with width {}", bits),
        }
    }

    /// Smallest unsigned integer type that can represent `x`.
    pub fn smallest_uint_for(&self, x: u64) -> TypeId {
        self.int_type(false, bits_needed_for_unsigned(x))
    }

    // ========================================================================
    // Derived-type constructors - interned on construction
    // ========================================================================

    fn intern(&mut self, key: TypeKey, build: impl FnOnce(&Self) -> TypeEntry) -> TypeId {
        if let Some(&id) = self.intern.get(&key) {
            return id;
        }
        let entry = build(self);
        let id = TypeId(self.entries.len() as u32);
        self.entries.push(entry);
        self.intern.insert(key, id);
        id
    }

    pub fn pointer_to(&mut self, child: TypeId, is_const: bool) -> TypeId {
        assert!(!child.is_invalid(), "pointer to invalid type");
        self.intern(TypeKey::Pointer { child, is_const }, |reg| {
            let const_str = if is_const { "const " } else { "" };
            let name = format!("&{}{}", const_str, reg.name(child));
            // A pointer to a zero-size type generates no code itself; an
            // incomplete container counts as sized until proven otherwise.
            let zero_bits = reg.size_bits(child) == 0
                && match reg.kind(child) {
                    TypeKind::Struct(c) | TypeKind::Enum(c) => reg.containers[c.index()].complete,
                    _ => true,
                };
            let (size, align) = if zero_bits {
                (0, 0)
            } else {
                (reg.pointer_bits, reg.pointer_bits)
            };
            TypeEntry {
                kind: TypeKind::Pointer { child, is_const },
                name,
                size_bits: size,
                align_bits: align,
                backend: None,
                backend_debug: None,
            }
        })
    }

    pub fn array_of(&mut self, child: TypeId, len: u64) -> TypeId {
        assert!(!child.is_invalid(), "array of invalid type");
        self.intern(TypeKey::Array { child, len }, |reg| TypeEntry {
            kind: TypeKind::Array { child, len },
            name: format!("[{}]{}", len, reg.name(child)),
            size_bits: reg.size_bits(child) * len,
            align_bits: reg.align_bits(child),
            backend: None,
            backend_debug: None,
        })
    }

    pub fn slice_of(&mut self, child: TypeId, is_const: bool) -> TypeId {
        assert!(!child.is_invalid(), "slice of invalid type");
        // The const slice reuses the non-const slice's backend layout, so
        // make sure the non-const peer exists first.
        if is_const {
            self.slice_of(child, false);
        }
        // The ptr field must exist for the backend.
        self.pointer_to(child, is_const);
        self.intern(TypeKey::Slice { child, is_const }, |reg| {
            let const_str = if is_const { "const " } else { "" };
            TypeEntry {
                kind: TypeKind::Slice { child, is_const },
                name: format!("[]{}{}", const_str, reg.name(child)),
                size_bits: reg.pointer_bits * 2,
                align_bits: reg.pointer_bits,
                backend: None,
                backend_debug: None,
            }
        })
    }

    pub fn optional_of(&mut self, child: TypeId) -> TypeId {
        assert!(!child.is_invalid(), "optional of invalid type");
        self.intern(TypeKey::Optional { child }, |reg| TypeEntry {
            kind: TypeKind::Optional { child },
            name: format!("?{}", reg.name(child)),
            size_bits: reg.size_bits(child) + 8,
            align_bits: reg.align_bits(child),
            backend: None,
            backend_debug: None,
        })
    }

    pub fn error_union_of(&mut self, child: TypeId) -> TypeId {
        assert!(!child.is_invalid(), "error union of invalid type");
        let tag_bits = self.err_tag_bits;
        self.intern(TypeKey::ErrorUnion { child }, |reg| {
            let (size, align) = if reg.size_bits(child) == 0 {
                // Representation collapses to the bare error tag.
                (tag_bits, tag_bits)
            } else {
                // Alignment follows the tag field, not the payload.
                (tag_bits + reg.size_bits(child), tag_bits)
            };
            TypeEntry {
                kind: TypeKind::ErrorUnion { child },
                name: format!("%{}", reg.name(child)),
                size_bits: size,
                align_bits: align,
                backend: None,
                backend_debug: None,
            }
        })
    }

    pub fn fn_type(&mut self, sig: FnSig, name: String) -> TypeId {
        let bits = self.pointer_bits;
        self.intern(TypeKey::Fn(sig.clone()), |_| TypeEntry {
            kind: TypeKind::Fn(sig),
            name,
            size_bits: bits,
            align_bits: bits,
            backend: None,
            backend_debug: None,
        })
    }

    // ========================================================================
    // Containers
    // ========================================================================

    pub fn new_container(
        &mut self,
        kind: ContainerKind,
        name: Symbol,
        printable: &str,
        decl_node: NodeId,
        file: FileId,
    ) -> ContainerId {
        let container_id = ContainerId(self.containers.len() as u32);
        let type_kind = match kind {
            ContainerKind::Struct => TypeKind::Struct(container_id),
            ContainerKind::Enum => TypeKind::Enum(container_id),
        };
        let type_id = self.push(type_kind, printable, 0, 0);
        self.containers.push(Container {
            kind,
            name,
            decl_node,
            file,
            type_id,
            fields: Vec::new(),
            methods: rustc_hash::FxHashMap::default(),
            embedded_in_current: false,
            reported_infinite_err: false,
            complete: false,
            is_invalid: false,
            tag_type: None,
        });
        container_id
    }

    pub fn container(&self, id: ContainerId) -> &Container {
        &self.containers[id.index()]
    }

    pub fn container_mut(&mut self, id: ContainerId) -> &mut Container {
        &mut self.containers[id.index()]
    }

    pub fn container_of(&self, ty: TypeId) -> Option<ContainerId> {
        match self.kind(ty) {
            TypeKind::Struct(c) | TypeKind::Enum(c) => Some(*c),
            _ => None,
        }
    }

    pub fn find_field(&self, container: ContainerId, name: Symbol) -> Option<&ContainerField> {
        self.containers[container.index()]
            .fields
            .iter()
            .find(|f| f.name == name)
    }

    // ========================================================================
    // Predicates and unwrap helpers
    // ========================================================================

    pub fn is_int(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Int { .. })
    }

    pub fn is_float(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Float { .. })
    }

    pub fn is_num_lit(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::NumLitInt | TypeKind::NumLitFloat)
    }

    pub fn is_signed_int(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Int { signed: true, .. })
    }

    pub fn is_unreachable(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Unreachable)
    }

    pub fn int_info(&self, id: TypeId) -> Option<(bool, u64)> {
        match self.kind(id) {
            TypeKind::Int { signed, bits, .. } => Some((*signed, *bits)),
            _ => None,
        }
    }

    pub fn pointer_child(&self, id: TypeId) -> Option<(TypeId, bool)> {
        match self.kind(id) {
            TypeKind::Pointer { child, is_const } => Some((*child, *is_const)),
            _ => None,
        }
    }

    pub fn slice_child(&self, id: TypeId) -> Option<(TypeId, bool)> {
        match self.kind(id) {
            TypeKind::Slice { child, is_const } => Some((*child, *is_const)),
            _ => None,
        }
    }

    pub fn array_info(&self, id: TypeId) -> Option<(TypeId, u64)> {
        match self.kind(id) {
            TypeKind::Array { child, len } => Some((*child, *len)),
            _ => None,
        }
    }

    pub fn optional_child(&self, id: TypeId) -> Option<TypeId> {
        match self.kind(id) {
            TypeKind::Optional { child } => Some(*child),
            _ => None,
        }
    }

    pub fn error_union_child(&self, id: TypeId) -> Option<TypeId> {
        match self.kind(id) {
            TypeKind::ErrorUnion { child } => Some(*child),
            _ => None,
        }
    }

    pub fn fn_sig(&self, id: TypeId) -> Option<&FnSig> {
        match self.kind(id) {
            TypeKind::Fn(sig) => Some(sig),
            _ => None,
        }
    }

    /// Whether values of this type are passed around by pointer, which means
    /// expressions producing one may need stack storage.
    pub fn handle_is_ptr(&self, id: TypeId) -> bool {
        match self.kind(id) {
            TypeKind::Array { .. }
            | TypeKind::Struct(_)
            | TypeKind::Slice { .. }
            | TypeKind::Optional { .. } => true,
            TypeKind::Enum(c) => self.containers[c.index()]
                .fields
                .iter()
                .any(|f| self.size_bits(f.ty) > 0),
            TypeKind::ErrorUnion { child } => self.size_bits(*child) > 0,
            _ => false,
        }
    }
}

fn bits_needed_for_unsigned(x: u64) -> u64 {
    if x <= u8::MAX as u64 {
        8
    } else if x <= u16::MAX as u64 {
        16
    } else if x <= u32::MAX as u64 {
        32
    } else {
        64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> TypeRegistry {
        TypeRegistry::new(64)
    }

    #[test]
    fn invalid_is_at_index_zero() {
        let reg = registry();
        assert!(reg.prim.invalid.is_invalid());
        assert!(!reg.prim.i32.is_invalid());
    }

    #[test]
    fn pointer_interning() {
        let mut reg = registry();
        let a = reg.pointer_to(reg.prim.u8, true);
        let b = reg.pointer_to(reg.prim.u8, true);
        let c = reg.pointer_to(reg.prim.u8, false);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(reg.name(a), "&const u8");
    }

    #[test]
    fn array_interning_per_length() {
        let mut reg = registry();
        let a = reg.array_of(reg.prim.i32, 3);
        let b = reg.array_of(reg.prim.i32, 3);
        let c = reg.array_of(reg.prim.i32, 4);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(reg.size_bits(a), 96);
        assert_eq!(reg.name(c), "[4]i32");
    }

    #[test]
    fn const_slice_is_distinct_type() {
        let mut reg = registry();
        let mutable = reg.slice_of(reg.prim.u8, false);
        let constant = reg.slice_of(reg.prim.u8, true);
        assert_ne!(mutable, constant);
        assert_eq!(reg.name(constant), "[]const u8");
        assert_eq!(reg.size_bits(constant), 128);
    }

    #[test]
    fn optional_layout() {
        let mut reg = registry();
        let opt = reg.optional_of(reg.prim.i32);
        assert_eq!(reg.name(opt), "?i32");
        assert_eq!(reg.size_bits(opt), 40);
    }

    #[test]
    fn error_union_of_void_collapses_to_tag() {
        let mut reg = registry();
        reg.size_pure_error_tag(3);
        let eu = reg.error_union_of(reg.prim.void);
        assert_eq!(reg.name(eu), "%void");
        assert_eq!(reg.size_bits(eu), 8);
        let eu_i32 = reg.error_union_of(reg.prim.i32);
        assert_eq!(reg.size_bits(eu_i32), 40);
    }

    #[test]
    fn smallest_uint_widths() {
        let reg = registry();
        assert_eq!(reg.smallest_uint_for(200), reg.prim.u8);
        assert_eq!(reg.smallest_uint_for(300), reg.prim.u16);
        assert_eq!(reg.smallest_uint_for(70_000), reg.prim.u32);
        assert_eq!(reg.smallest_uint_for(u64::MAX), reg.prim.u64);
    }

    #[test]
    fn isize_is_not_i64() {
        let mut reg = registry();
        assert_ne!(reg.prim.isize, reg.prim.i64);
        // Both are 64-bit signed integers on this target.
        assert_eq!(reg.int_info(reg.prim.isize), Some((true, 64)));
        // Interning keeps them distinct through derived types.
        let p1 = reg.pointer_to(reg.prim.isize, false);
        let p2 = reg.pointer_to(reg.prim.i64, false);
        assert_ne!(p1, p2);
    }

    #[test]
    fn pointer_to_zero_size_type_has_zero_size() {
        let mut reg = registry();
        let p = reg.pointer_to(reg.prim.void, false);
        assert_eq!(reg.size_bits(p), 0);
        let q = reg.pointer_to(reg.prim.i32, false);
        assert_eq!(reg.size_bits(q), 64);
    }

    #[test]
    fn fn_type_structural_interning() {
        let mut reg = registry();
        let sig = FnSig {
            params: smallvec::smallvec![reg.prim.i32],
            return_type: reg.prim.void,
            is_var_args: false,
            is_extern: false,
            is_naked: false,
        };
        let a = reg.fn_type(sig.clone(), "fn(i32)".to_string());
        let b = reg.fn_type(sig, "fn(i32)".to_string());
        assert_eq!(a, b);
    }

    #[test]
    fn container_starts_incomplete() {
        let mut reg = registry();
        let c = reg.new_container(
            ContainerKind::Struct,
            Symbol(0),
            "Point",
            NodeId(0),
            FileId(0),
        );
        let container = reg.container(c);
        assert!(!container.complete);
        assert!(!container.embedded_in_current);
        assert_eq!(reg.name(container.type_id), "Point");
        assert_eq!(reg.container_of(container.type_id), Some(c));
    }
}
