//! Permissive scanner for kernel declarations in PTX text.
//!
//! The scanner looks for `.entry` declarations, pulls out the kernel name,
//! and derives a byte width for each `.param` in the parameter list from
//! the type tag (`.u32`, `.s16`, `.f64`, ...) and an optional `[N]` array
//! suffix. PTX keeps growing syntax, so anything the scanner does not
//! recognize degrades to a zero width or a skipped clause instead of a
//! failed scan — a kernel the shim cannot marshal is still better than a
//! module load the shim refuses.

/// Kernel names longer than this are truncated.
pub const MAX_KERNEL_NAME: usize = 1024;

/// Parameters past this count are dropped.
pub const MAX_KERNEL_PARAMS: usize = 128;

/// One kernel declaration discovered in a PTX blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelDecl {
    pub name: String,
    /// Bytes to copy per launch argument slot; 0 for unrecognized types.
    pub arg_widths: Vec<u32>,
}

fn is_ident(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Byte width of a scalar type tag, given the text following its '.'.
/// Recognizes the unsigned/signed/float families only.
fn type_width(bytes: &[u8]) -> u32 {
    match bytes.first() {
        Some(b'u') | Some(b's') | Some(b'f') => {}
        _ => return 0,
    }
    match (bytes.get(1), bytes.get(2)) {
        (Some(b'8'), _) => 1,
        (Some(b'1'), Some(b'6')) => 2,
        (Some(b'3'), Some(b'2')) => 4,
        (Some(b'6'), Some(b'4')) => 8,
        _ => 0,
    }
}

/// Scan a PTX blob for kernel declarations. Pure and total: the same input
/// always yields the same declarations, and no input panics.
pub fn scan(ptx: &[u8]) -> Vec<KernelDecl> {
    let mut kernels = Vec::new();
    let mut i = 0usize;

    while i < ptx.len() {
        if ptx[i] != b'.' || !ptx[i + 1..].starts_with(b"entry") {
            i += 1;
            continue;
        }
        i += ".entry".len();

        // The kernel name is the next identifier run.
        while i < ptx.len() && !is_ident(ptx[i]) {
            i += 1;
        }
        let name_start = i;
        while i < ptx.len() && is_ident(ptx[i]) && i - name_start < MAX_KERNEL_NAME - 1 {
            i += 1;
        }
        let name = String::from_utf8_lossy(&ptx[name_start..i]).into_owned();

        // '(' opens the parameter list, '{' the body of a parameterless
        // kernel; whichever comes first.
        while i < ptx.len() && ptx[i] != b'(' && ptx[i] != b'{' {
            i += 1;
        }

        let mut widths = Vec::new();
        if i < ptx.len() && ptx[i] == b'(' {
            scan_params(ptx, &mut i, &mut widths);
        }

        if !name.is_empty() {
            kernels.push(KernelDecl {
                name,
                arg_widths: widths,
            });
        }
    }

    kernels
}

fn scan_params(ptx: &[u8], pos: &mut usize, widths: &mut Vec<u32>) {
    let mut i = *pos;

    'params: while widths.len() < MAX_KERNEL_PARAMS {
        // Find the next clause or the end of the list.
        while i < ptx.len() && ptx[i] != b'.' && ptx[i] != b')' {
            i += 1;
        }
        if i >= ptx.len() || ptx[i] == b')' {
            break;
        }
        if !ptx[i..].starts_with(b".param") {
            // Some other directive inside the list; not a parameter.
            i += 1;
            continue;
        }
        i += ".param".len();

        let mut width: u32 = 0;
        loop {
            while i < ptx.len()
                && ptx[i] != b'.'
                && ptx[i] != b','
                && ptx[i] != b')'
                && ptx[i] != b'['
            {
                i += 1;
            }
            if i >= ptx.len() {
                // Truncated clause: keep what we have.
                widths.push(width);
                break 'params;
            }
            match ptx[i] {
                b'.' => {
                    i += 1;
                    let w = type_width(&ptx[i..]);
                    if w != 0 {
                        width = w;
                    }
                }
                b'[' => {
                    i += 1;
                    let mut n: u32 = 0;
                    while i < ptx.len() && ptx[i] != b']' {
                        if ptx[i].is_ascii_digit() {
                            n = n.saturating_mul(10).saturating_add(u32::from(ptx[i] - b'0'));
                        }
                        i += 1;
                    }
                    width = width.saturating_mul(n);
                }
                // ',' or ')': end of this parameter.
                _ => break,
            }
        }
        widths.push(width);
    }

    *pos = i;
}
