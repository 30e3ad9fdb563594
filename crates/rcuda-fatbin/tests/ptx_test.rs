//! Scanner tests: the width table, fault tolerance on unknown syntax, and
//! the hard caps on name length and parameter count.

use rcuda_fatbin::ptx::{scan, MAX_KERNEL_NAME, MAX_KERNEL_PARAMS};

#[test]
fn width_table_for_scalar_and_array_types() {
    let ptx = b".entry k(.param .u8 x, .param .s32 y, .param .f64 z, .param .u16 a[4]) {";
    let kernels = scan(ptx);
    assert_eq!(kernels.len(), 1);
    assert_eq!(kernels[0].name, "k");
    assert_eq!(kernels[0].arg_widths, vec![1, 4, 8, 8]);
}

#[test]
fn unknown_type_keeps_the_slot_with_zero_width() {
    let kernels = scan(b".entry k(.param .b64 x, .param .u32 n) {");
    assert_eq!(kernels[0].arg_widths, vec![0, 4]);
}

#[test]
fn predicate_param_is_zero_width() {
    let kernels = scan(b".entry k(.param .pred p) {");
    assert_eq!(kernels[0].arg_widths, vec![0]);
}

#[test]
fn align_qualifier_does_not_hide_the_type() {
    let kernels = scan(b".entry k(.param .align 8 .u64 ptr) {");
    assert_eq!(kernels[0].arg_widths, vec![8]);
}

#[test]
fn unknown_array_type_stays_zero() {
    let kernels = scan(b".entry k(.param .b8 buf[12]) {");
    assert_eq!(kernels[0].arg_widths, vec![0]);
}

#[test]
fn parameterless_kernel() {
    let kernels = scan(b".entry noargs {\n  ret;\n}");
    assert_eq!(kernels.len(), 1);
    assert_eq!(kernels[0].name, "noargs");
    assert!(kernels[0].arg_widths.is_empty());
}

#[test]
fn multiple_kernels_in_one_module() {
    let ptx = b"\
.version 7.0\n\
.target sm_70\n\
.entry first(.param .u32 a) {\n ret;\n}\n\
.entry second(.param .f32 x, .param .u64 p) {\n ret;\n}\n";
    let kernels = scan(ptx);
    assert_eq!(kernels.len(), 2);
    assert_eq!(kernels[0].name, "first");
    assert_eq!(kernels[0].arg_widths, vec![4]);
    assert_eq!(kernels[1].name, "second");
    assert_eq!(kernels[1].arg_widths, vec![4, 8]);
}

#[test]
fn scan_is_deterministic() {
    let ptx = b".entry k(.param .u32 a, .param .b16 b, .param .f64 c[3]) {";
    assert_eq!(scan(ptx), scan(ptx));
}

#[test]
fn overlong_name_is_truncated() {
    let mut ptx = b".entry ".to_vec();
    ptx.extend(std::iter::repeat(b'n').take(1500));
    ptx.extend_from_slice(b"(.param .u32 a) {");
    let kernels = scan(&ptx);
    assert_eq!(kernels.len(), 1);
    assert_eq!(kernels[0].name.len(), MAX_KERNEL_NAME - 1);
    assert_eq!(kernels[0].arg_widths, vec![4]);
}

#[test]
fn excess_parameters_are_dropped() {
    let mut ptx = b".entry wide(".to_vec();
    for i in 0..(MAX_KERNEL_PARAMS + 10) {
        if i > 0 {
            ptx.extend_from_slice(b", ");
        }
        ptx.extend_from_slice(format!(".param .u32 p{i}").as_bytes());
    }
    ptx.extend_from_slice(b") {");
    let kernels = scan(&ptx);
    assert_eq!(kernels.len(), 1);
    assert_eq!(kernels[0].arg_widths.len(), MAX_KERNEL_PARAMS);
    assert!(kernels[0].arg_widths.iter().all(|&w| w == 4));
}

#[test]
fn truncated_input_never_panics() {
    let ptx = b".entry k(.param .u32 a, .param .u64 b) {";
    for end in 0..ptx.len() {
        let _ = scan(&ptx[..end]);
    }
}

#[test]
fn binary_garbage_never_panics() {
    let mut blob = Vec::new();
    let mut x: u32 = 0x12345678;
    for _ in 0..4096 {
        x = x.wrapping_mul(1103515245).wrapping_add(12345);
        blob.push((x >> 16) as u8);
    }
    // Sprinkle some trigger tokens through the noise.
    blob[100..107].copy_from_slice(b".entry ");
    blob[2000..2007].copy_from_slice(b".param ");
    let _ = scan(&blob);
}

#[test]
fn entry_at_end_of_input_yields_nothing() {
    assert!(scan(b".entry").is_empty());
    assert!(scan(b".entry   ").is_empty());
}
