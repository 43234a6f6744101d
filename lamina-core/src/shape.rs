//! Batch element shape classification.
//!
//! Multi-item operations decode each element with a strategy picked by
//! the element type's structural category. The category is a closed tag
//! reported by the data-binding layer for the element type;
//! classification maps it onto a decode strategy, or rejects the batch
//! before any cache or store traffic happens.

/// Structural category of a batch element type, as reported by the
/// data-binding layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementBinding {
    /// The element type, or a reference to it, implements the custom
    /// load/save capability.
    LoadSave,
    /// A plain structured record.
    Struct,
    /// A reference to a structured record.
    StructRef,
    /// A polymorphic element decoded through type-erased dispatch.
    Dynamic,
    /// The raw property-list representation.
    PropertyList,
    /// Anything the binding layer cannot map onto a record shape.
    Opaque,
}

/// Decode strategy used for the elements of one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchShape {
    /// Elements are rebuilt through their load/save hooks.
    LoadSave,
    /// Elements decode directly into struct values.
    Struct,
    /// Elements decode into freshly allocated referenced structs.
    StructRef,
    /// Elements decode through their polymorphic representation.
    Dynamic,
}

/// Map an element binding onto a batch decode strategy.
///
/// Returns `None` for bindings that have no strategy: bare property
/// lists are rejected even though they are structurally sequences, and
/// opaque element types are not decodable at all.
pub fn classify(binding: ElementBinding) -> Option<BatchShape> {
    match binding {
        ElementBinding::LoadSave => Some(BatchShape::LoadSave),
        ElementBinding::Struct => Some(BatchShape::Struct),
        ElementBinding::StructRef => Some(BatchShape::StructRef),
        ElementBinding::Dynamic => Some(BatchShape::Dynamic),
        ElementBinding::PropertyList | ElementBinding::Opaque => None,
    }
}
