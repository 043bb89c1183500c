//! std140 alignment rules for uniform and storage blocks
//!
//! Every CPU-side struct that backs a GPU uniform or storage buffer must have
//! field offsets matching the shader-side block layout. There is no runtime
//! check for a mismatch; the GPU silently reads wrong data. These const
//! functions compute the std140 alignment for each supported shape so that
//! layouts can be verified with compile-time assertions (see
//! [`crate::render::ubo`]).

/// Round `value` up to the next multiple of `alignment`.
///
/// `alignment` must be a power of two.
pub const fn round_up(value: usize, alignment: usize) -> usize {
    (value + alignment - 1) & !(alignment - 1)
}

/// Alignment of a scalar: its own size.
pub const fn scalar_alignment(elem_size: usize) -> usize {
    elem_size
}

/// Alignment of a 2/3/4-component vector.
///
/// 2-vectors align to twice the element size; 3- and 4-vectors both align to
/// four times the element size.
pub const fn vector_alignment(components: usize, elem_size: usize) -> usize {
    match components {
        2 => 2 * elem_size,
        3 | 4 => 4 * elem_size,
        _ => panic!("std140 vectors have 2, 3 or 4 components"),
    }
}

/// Alignment of an array: the element alignment rounded up to 16 bytes.
///
/// This is also the array stride for tightly packed std140 arrays, which is
/// why `vec3[]` arrays waste a float per element.
pub const fn array_alignment(elem_alignment: usize) -> usize {
    round_up(elem_alignment, 16)
}

/// Alignment of a column-major matrix, treated as an array of column vectors.
pub const fn matrix_alignment(rows: usize, elem_size: usize) -> usize {
    array_alignment(vector_alignment(rows, elem_size))
}

/// Alignment of an aggregate struct: the largest member alignment, floored
/// at 16 bytes.
pub const fn struct_alignment(max_member_alignment: usize) -> usize {
    round_up(max_member_alignment, 16)
}

/// Types with a known std140 alignment inside a uniform/storage block.
///
/// Implemented for the scalar, vector and matrix shapes the engine uploads.
/// Aggregates compute theirs with [`struct_alignment`] over their members.
pub trait Std140 {
    /// Byte alignment of this type inside a std140 block.
    const ALIGNMENT: usize;
}

macro_rules! impl_std140 {
    ($($ty:ty => $align:expr),* $(,)?) => {
        $(impl Std140 for $ty {
            const ALIGNMENT: usize = $align;
        })*
    };
}

impl_std140! {
    f32 => scalar_alignment(4),
    i32 => scalar_alignment(4),
    u32 => scalar_alignment(4),
    [f32; 2] => vector_alignment(2, 4),
    [f32; 3] => vector_alignment(3, 4),
    [f32; 4] => vector_alignment(4, 4),
    [[f32; 4]; 4] => matrix_alignment(4, 4),
    [[f32; 3]; 3] => matrix_alignment(3, 4),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_up() {
        assert_eq!(round_up(0, 16), 0);
        assert_eq!(round_up(1, 16), 16);
        assert_eq!(round_up(16, 16), 16);
        assert_eq!(round_up(17, 16), 32);
        assert_eq!(round_up(12, 4), 12);
    }

    #[test]
    fn test_scalar_alignments() {
        assert_eq!(f32::ALIGNMENT, 4);
        assert_eq!(u32::ALIGNMENT, 4);
        assert_eq!(i32::ALIGNMENT, 4);
    }

    #[test]
    fn test_vector_alignments() {
        // vec2 -> 8, vec3 -> 16, vec4 -> 16
        assert_eq!(<[f32; 2]>::ALIGNMENT, 8);
        assert_eq!(<[f32; 3]>::ALIGNMENT, 16);
        assert_eq!(<[f32; 4]>::ALIGNMENT, 16);
    }

    #[test]
    fn test_matrix_alignments() {
        // mat4 columns are vec4s; mat3 columns are vec3s padded to 16
        assert_eq!(<[[f32; 4]; 4]>::ALIGNMENT, 16);
        assert_eq!(<[[f32; 3]; 3]>::ALIGNMENT, 16);
    }

    #[test]
    fn test_array_alignments() {
        // Array elements round up to a 16-byte multiple of their alignment
        assert_eq!(array_alignment(f32::ALIGNMENT), 16);
        assert_eq!(array_alignment(<[f32; 2]>::ALIGNMENT), 16);
        assert_eq!(array_alignment(<[f32; 4]>::ALIGNMENT), 16);
        assert_eq!(array_alignment(32), 32);
    }

    #[test]
    fn test_struct_alignment_floors_at_16() {
        assert_eq!(struct_alignment(4), 16);
        assert_eq!(struct_alignment(8), 16);
        assert_eq!(struct_alignment(16), 16);
        assert_eq!(struct_alignment(32), 32);
    }

    #[test]
    fn test_alignment_properties() {
        // alignment(T) % 4 == 0 and alignment(T) >= native alignment
        let alignments = [
            f32::ALIGNMENT,
            u32::ALIGNMENT,
            <[f32; 2]>::ALIGNMENT,
            <[f32; 3]>::ALIGNMENT,
            <[f32; 4]>::ALIGNMENT,
            <[[f32; 4]; 4]>::ALIGNMENT,
        ];
        for align in alignments {
            assert_eq!(align % 4, 0);
        }
        assert!(f32::ALIGNMENT >= std::mem::align_of::<f32>());
        assert!(<[f32; 4]>::ALIGNMENT >= std::mem::align_of::<[f32; 4]>());
    }

    #[test]
    fn test_nested_aggregate_alignment() {
        // A struct whose largest member is a vec3 aligns to 16; nesting it
        // inside another struct keeps the 16-byte floor.
        let inner = struct_alignment(<[f32; 3]>::ALIGNMENT);
        assert_eq!(inner, 16);
        let outer = struct_alignment(inner.max(<[f32; 2]>::ALIGNMENT));
        assert_eq!(outer, 16);
    }
}
