//! Shaders for the Helion sample applications.
//!
//! GLSL sources are compiled to SPIR-V at build time using shaderc and
//! embedded into the binary.

use std::sync::OnceLock;

/// Embedded SPIR-V shader bytecode (raw bytes, may not be aligned).
mod spirv_bytes {
    /// Textured quad vertex shader (compiled SPIR-V).
    pub static QUAD_VERT: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/quad_vert.spv"));

    /// Textured quad fragment shader (compiled SPIR-V).
    pub static QUAD_FRAG: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/quad_frag.spv"));
}

/// Convert byte slice to aligned u32 Vec (SPIR-V requires 4-byte alignment).
fn bytes_to_spirv(bytes: &[u8]) -> Vec<u32> {
    assert!(
        bytes.len() % 4 == 0,
        "SPIR-V bytecode must be 4-byte aligned"
    );
    bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

static QUAD_VERT_SPIRV: OnceLock<Vec<u32>> = OnceLock::new();
static QUAD_FRAG_SPIRV: OnceLock<Vec<u32>> = OnceLock::new();

/// Get the quad vertex shader as a u32 slice for Vulkan.
pub fn quad_vert_shader() -> &'static [u32] {
    QUAD_VERT_SPIRV.get_or_init(|| bytes_to_spirv(spirv_bytes::QUAD_VERT))
}

/// Get the quad fragment shader as a u32 slice for Vulkan.
pub fn quad_frag_shader() -> &'static [u32] {
    QUAD_FRAG_SPIRV.get_or_init(|| bytes_to_spirv(spirv_bytes::QUAD_FRAG))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shaders_load() {
        for shader in [quad_vert_shader(), quad_frag_shader()] {
            assert_eq!(shader[0], 0x0723_0203, "Invalid SPIR-V magic number");
            assert!(shader.len() > 20, "Shader too small");
        }
    }
}
