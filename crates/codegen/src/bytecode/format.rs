//! ALKB binary module format
//!
//! Layout (big-endian throughout):
//!
//! ```text
//! magic   u32 = "ALKB"
//! version u16 = 1
//! "FN"    u32 function count
//!   "FH"  u32 size | u16 name len | name | u32 params | u32 registers
//!   "CP"  u32 size | u32 count | { u8 tag | payload }*
//!   "CD"  u32 size | u32 word*
//! ```
//!
//! Constant payloads: 0 int32, 1 float32, 2 bool (one byte), 3 string,
//! 4 function ref (string + u32 arity), 5 class ref (string), 6 field ref
//! (string + string), 7 method ref (string + string + u32 arity). A string
//! is a u32 byte length followed by UTF-8.
//!
//! The legacy single-function form is the header followed directly by one
//! `CD` section. It is read back as a function named `main`.

use super::constant_pool::{Constant, ConstantPool};
use super::function::CompiledFunction;
use super::instruction::Instruction;
use super::module::CompiledModule;
use crate::error::{FormatError, FormatResult};
use std::io::{Read, Write};
use tracing::debug;

pub const MAGIC: u32 = 0x414C_4B42;
pub const FORMAT_VERSION: u16 = 1;

/// Name given to the single function of a legacy code-only file.
pub const LEGACY_FUNCTION_NAME: &str = "main";

const TAG_FN: [u8; 2] = *b"FN";
const TAG_FH: [u8; 2] = *b"FH";
const TAG_CP: [u8; 2] = *b"CP";
const TAG_CD: [u8; 2] = *b"CD";

// ===== Writing =====

pub fn write_module(module: &CompiledModule) -> FormatResult<Vec<u8>> {
    let mut w = Writer::new();
    w.header();
    w.tag(TAG_FN);
    w.u32(to_u32("function count", module.functions.len())?);
    for function in &module.functions {
        w.function(function)?;
    }
    debug!(
        functions = module.functions.len(),
        bytes = w.buf.len(),
        "serialized module"
    );
    Ok(w.buf)
}

pub fn write_to<W: Write>(module: &CompiledModule, out: &mut W) -> FormatResult<()> {
    let bytes = write_module(module)?;
    out.write_all(&bytes)?;
    Ok(())
}

/// Write `code` in the legacy code-only form.
pub fn write_legacy_code(code: &[Instruction]) -> FormatResult<Vec<u8>> {
    let mut w = Writer::new();
    w.header();
    w.code(code)?;
    Ok(w.buf)
}

struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }

    fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn tag(&mut self, tag: [u8; 2]) {
        self.buf.extend_from_slice(&tag);
    }

    fn str(&mut self, s: &str) -> FormatResult<()> {
        self.u32(to_u32("string length", s.len())?);
        self.buf.extend_from_slice(s.as_bytes());
        Ok(())
    }

    fn header(&mut self) {
        self.u32(MAGIC);
        self.u16(FORMAT_VERSION);
    }

    /// Write `tag`, then a size slot back-filled with the byte length of
    /// whatever `body` appends.
    fn section(
        &mut self,
        tag: [u8; 2],
        body: impl FnOnce(&mut Self) -> FormatResult<()>,
    ) -> FormatResult<()> {
        self.tag(tag);
        let slot = self.buf.len();
        self.u32(0);
        let start = self.buf.len();
        body(self)?;
        let size = to_u32("section size", self.buf.len() - start)?;
        self.buf[slot..slot + 4].copy_from_slice(&size.to_be_bytes());
        Ok(())
    }

    fn function(&mut self, f: &CompiledFunction) -> FormatResult<()> {
        self.section(TAG_FH, |w| {
            let name_len = u16::try_from(f.name.len()).map_err(|_| FormatError::ValueTooLarge {
                what: "function name length",
                value: f.name.len(),
            })?;
            w.u16(name_len);
            w.buf.extend_from_slice(f.name.as_bytes());
            w.u32(f.num_params);
            w.u32(f.num_registers);
            Ok(())
        })?;
        self.section(TAG_CP, |w| {
            w.u32(to_u32("constant count", f.constants.len())?);
            for (_, constant) in f.constants.iter() {
                w.constant(constant)?;
            }
            Ok(())
        })?;
        self.code(&f.code)
    }

    fn constant(&mut self, constant: &Constant) -> FormatResult<()> {
        self.u8(constant.tag());
        match constant {
            Constant::Int(v) => self.buf.extend_from_slice(&v.to_be_bytes()),
            Constant::Float(v) => self.u32(v.to_bits()),
            Constant::Bool(v) => self.u8(u8::from(*v)),
            Constant::String(s) | Constant::ClassRef(s) => self.str(s)?,
            Constant::FunctionRef { name, arity } => {
                self.str(name)?;
                self.u32(*arity);
            }
            Constant::FieldRef { class, field } => {
                self.str(class)?;
                self.str(field)?;
            }
            Constant::MethodRef {
                class,
                method,
                arity,
            } => {
                self.str(class)?;
                self.str(method)?;
                self.u32(*arity);
            }
        }
        Ok(())
    }

    fn code(&mut self, code: &[Instruction]) -> FormatResult<()> {
        self.section(TAG_CD, |w| {
            for ins in code {
                w.u32(ins.word());
            }
            Ok(())
        })
    }
}

fn to_u32(what: &'static str, value: usize) -> FormatResult<u32> {
    u32::try_from(value).map_err(|_| FormatError::ValueTooLarge { what, value })
}

// ===== Reading =====

/// Decode a module, accepting both the sectioned and the legacy form.
pub fn read_module(bytes: &[u8]) -> FormatResult<CompiledModule> {
    let mut r = Reader::new(bytes);
    r.header()?;

    let module = match r.peek_tag()? {
        TAG_FN => {
            r.expect_tag(TAG_FN)?;
            let count = r.u32()?;
            let mut functions = Vec::new();
            for _ in 0..count {
                functions.push(r.function()?);
            }
            CompiledModule::from(functions)
        }
        TAG_CD => {
            let code = r.code()?;
            debug!(instructions = code.len(), "read legacy code-only module");
            CompiledModule::from(vec![CompiledFunction::from_code(
                LEGACY_FUNCTION_NAME.to_string(),
                code,
            )])
        }
        other => {
            return Err(FormatError::TagMismatch {
                expected: "FN or CD".to_string(),
                found: show_tag(other),
                offset: r.pos,
            })
        }
    };

    r.finish()?;
    debug!(functions = module.len(), bytes = bytes.len(), "deserialized module");
    Ok(module)
}

pub fn read_from<R: Read>(input: &mut R) -> FormatResult<CompiledModule> {
    let mut bytes = Vec::new();
    input.read_to_end(&mut bytes)?;
    read_module(&bytes)
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> FormatResult<&'a [u8]> {
        let remaining = self.data.len() - self.pos;
        if remaining < n {
            return Err(FormatError::UnexpectedEof {
                offset: self.pos,
                needed: n - remaining,
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> FormatResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> FormatResult<u8> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> FormatResult<u16> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    fn u32(&mut self) -> FormatResult<u32> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    fn utf8(&mut self, len: usize) -> FormatResult<String> {
        let offset = self.pos;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| FormatError::InvalidUtf8 { offset })
    }

    fn str(&mut self) -> FormatResult<String> {
        let len = self.u32()? as usize;
        self.utf8(len)
    }

    fn header(&mut self) -> FormatResult<()> {
        let magic = self.u32()?;
        if magic != MAGIC {
            return Err(FormatError::BadMagic {
                expected: MAGIC,
                found: magic,
            });
        }
        let version = self.u16()?;
        if version != FORMAT_VERSION {
            return Err(FormatError::UnsupportedVersion {
                found: version,
                supported: FORMAT_VERSION,
            });
        }
        Ok(())
    }

    fn peek_tag(&self) -> FormatResult<[u8; 2]> {
        let mut probe = Reader {
            data: self.data,
            pos: self.pos,
        };
        probe.array()
    }

    fn expect_tag(&mut self, expected: [u8; 2]) -> FormatResult<()> {
        let offset = self.pos;
        let found: [u8; 2] = self.array()?;
        if found != expected {
            return Err(FormatError::TagMismatch {
                expected: show_tag(expected),
                found: show_tag(found),
                offset,
            });
        }
        Ok(())
    }

    /// Read a tagged, size-prefixed section and check that `body` consumed
    /// exactly the declared number of bytes.
    fn section<T>(
        &mut self,
        tag: [u8; 2],
        name: &'static str,
        body: impl FnOnce(&mut Self) -> FormatResult<T>,
    ) -> FormatResult<T> {
        self.expect_tag(tag)?;
        let declared = self.u32()? as usize;
        let start = self.pos;
        let value = body(self)?;
        let actual = self.pos - start;
        if actual != declared {
            return Err(FormatError::SizeMismatch {
                section: name,
                declared,
                actual,
            });
        }
        Ok(value)
    }

    fn function(&mut self) -> FormatResult<CompiledFunction> {
        let (name, num_params, num_registers) = self.section(TAG_FH, "FH", |r| {
            let name_len = r.u16()? as usize;
            let name = r.utf8(name_len)?;
            Ok((name, r.u32()?, r.u32()?))
        })?;
        let constants = self.section(TAG_CP, "CP", |r| r.constant_pool())?;
        let code = self.code()?;
        Ok(CompiledFunction::new(
            name,
            num_params,
            num_registers,
            constants,
            code,
        ))
    }

    fn constant_pool(&mut self) -> FormatResult<ConstantPool> {
        let count = self.u32()?;
        let mut pool = ConstantPool::new();
        for _ in 0..count {
            let constant = self.constant()?;
            pool.push_unique(constant)
                .map_err(|index| FormatError::DuplicateConstant { index })?;
        }
        Ok(pool)
    }

    fn constant(&mut self) -> FormatResult<Constant> {
        let offset = self.pos;
        let tag = self.u8()?;
        let constant = match tag {
            0 => Constant::Int(i32::from_be_bytes(self.array()?)),
            1 => Constant::Float(f32::from_bits(self.u32()?)),
            2 => Constant::Bool(self.u8()? != 0),
            3 => Constant::String(self.str()?),
            4 => Constant::FunctionRef {
                name: self.str()?,
                arity: self.u32()?,
            },
            5 => Constant::ClassRef(self.str()?),
            6 => Constant::FieldRef {
                class: self.str()?,
                field: self.str()?,
            },
            7 => Constant::MethodRef {
                class: self.str()?,
                method: self.str()?,
                arity: self.u32()?,
            },
            _ => return Err(FormatError::UnknownConstantTag { tag, offset }),
        };
        Ok(constant)
    }

    fn code(&mut self) -> FormatResult<Vec<Instruction>> {
        self.expect_tag(TAG_CD)?;
        let size = self.u32()? as usize;
        if size % 4 != 0 {
            return Err(FormatError::MisalignedCode { size });
        }
        let words = self.take(size)?;
        Ok(words
            .chunks_exact(4)
            .map(|w| Instruction::from_word(u32::from_be_bytes([w[0], w[1], w[2], w[3]])))
            .collect())
    }

    fn finish(&self) -> FormatResult<()> {
        let count = self.data.len() - self.pos;
        if count > 0 {
            return Err(FormatError::TrailingBytes { count });
        }
        Ok(())
    }
}

fn show_tag(tag: [u8; 2]) -> String {
    tag.iter()
        .map(|&b| {
            if b.is_ascii_graphic() {
                (b as char).to_string()
            } else {
                format!("\\x{:02x}", b)
            }
        })
        .collect()
}
