/// Expands the convolution operator template for a specific ISA.
///
/// This macro is the "Layer 4" of the architecture. It takes a module name,
/// an ISA identifier, the element type, and the `target_feature` strings
/// the generated kernels require, and produces a module containing the
/// complete microkernel set plus the tile drain loop for that ISA.
#[macro_export]
macro_rules! expand_isa_impls {
    ($module_name:ident, $isa:ident, $elem:ident, [$($feat:literal),*]) => {
        pub mod $module_name {
            #[allow(unused_imports)]
            use std::sync::atomic::{AtomicUsize, Ordering};

            #[allow(unused_imports)]
            use $crate::cpu_kernels::{BLOCK_SIZE_HOR, BLOCK_SIZE_VER, VEC_WIDTH};
            #[allow(unused_imports)]
            use $crate::scratch::Scratch;
            #[allow(unused_imports)]
            use $crate::tensor::LayerShape;

            $crate::define_conv3x3_ops!($isa, $elem, [$($feat),*]);
        }
    };
}
