//! Module, section and instruction builders for the output format.
//!
//! Everything here serializes through [`binary::Writer`] via the
//! [`Encode`] hook; the builders own the section ids, entry framing
//! and opcode table so the generator can work purely in terms of typed
//! values. Only the subset of the instruction set the generator emits
//! is modeled.

use crate::binary::{Encode, Writer};

/// Value types of the output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValType {
    I32,
    I64,
    F32,
    F64,
}

impl Encode for ValType {
    fn encode(&self, writer: &mut Writer) {
        let byte = match self {
            ValType::I32 => 0x7f,
            ValType::I64 => 0x7e,
            ValType::F32 => 0x7d,
            ValType::F64 => 0x7c,
        };
        writer.push(byte);
    }
}

/// What an export entry points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Func,
    Memory,
    Global,
}

impl Encode for ExportKind {
    fn encode(&self, writer: &mut Writer) {
        let byte = match self {
            ExportKind::Func => 0x00,
            ExportKind::Memory => 0x02,
            ExportKind::Global => 0x03,
        };
        writer.push(byte);
    }
}

/// Result arity of a structured control instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    Empty,
    Result(ValType),
}

impl Encode for BlockType {
    fn encode(&self, writer: &mut Writer) {
        match self {
            BlockType::Empty => writer.push(0x40),
            BlockType::Result(ty) => ty.encode(writer),
        }
    }
}

/// The instructions the generator knows how to emit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Instruction {
    Unreachable,
    Block(BlockType),
    Loop(BlockType),
    If(BlockType),
    Else,
    End,
    Br(u32),
    BrIf(u32),
    Return,
    Call(u32),
    Drop,

    LocalGet(u32),
    LocalSet(u32),
    GlobalGet(u32),
    GlobalSet(u32),

    I32Load { offset: u32 },
    I64Load { offset: u32 },
    F32Load { offset: u32 },
    F64Load { offset: u32 },
    I32Store { offset: u32 },
    I64Store { offset: u32 },
    F32Store { offset: u32 },
    F64Store { offset: u32 },

    I32Const(i32),
    I64Const(i64),
    F32Const(f32),
    F64Const(f64),

    I32Eqz,
    I32Eq,
    I32Ne,
    I32LtS,
    I32GtS,
    I32LeS,
    I32GeS,
    I64Eq,
    I64Ne,
    I64LtS,
    I64GtS,
    I64LeS,
    I64GeS,
    F32Eq,
    F32Ne,
    F32Lt,
    F32Gt,
    F32Le,
    F32Ge,
    F64Eq,
    F64Ne,
    F64Lt,
    F64Gt,
    F64Le,
    F64Ge,

    I32Add,
    I32Sub,
    I32Mul,
    I32DivS,
    I32RemS,
    I64Add,
    I64Sub,
    I64Mul,
    I64DivS,
    I64RemS,
    F32Neg,
    F32Add,
    F32Sub,
    F32Mul,
    F32Div,
    F64Neg,
    F64Add,
    F64Sub,
    F64Mul,
    F64Div,
}

/// `align` hint + offset immediate pair carried by memory accesses.
/// Alignment 0 (byte) keeps packed layouts valid everywhere.
fn encode_memarg(writer: &mut Writer, offset: u32) {
    writer.write_uvar(0, 32);
    writer.write_uvar(u64::from(offset), 32);
}

impl Encode for Instruction {
    fn encode(&self, writer: &mut Writer) {
        use Instruction::*;
        match *self {
            Unreachable => writer.push(0x00),
            Block(bt) => {
                writer.push(0x02);
                bt.encode(writer);
            }
            Loop(bt) => {
                writer.push(0x03);
                bt.encode(writer);
            }
            If(bt) => {
                writer.push(0x04);
                bt.encode(writer);
            }
            Else => writer.push(0x05),
            End => writer.push(0x0b),
            Br(label) => {
                writer.push(0x0c);
                writer.write_uvar(u64::from(label), 32);
            }
            BrIf(label) => {
                writer.push(0x0d);
                writer.write_uvar(u64::from(label), 32);
            }
            Return => writer.push(0x0f),
            Call(index) => {
                writer.push(0x10);
                writer.write_uvar(u64::from(index), 32);
            }
            Drop => writer.push(0x1a),

            LocalGet(index) => {
                writer.push(0x20);
                writer.write_uvar(u64::from(index), 32);
            }
            LocalSet(index) => {
                writer.push(0x21);
                writer.write_uvar(u64::from(index), 32);
            }
            GlobalGet(index) => {
                writer.push(0x23);
                writer.write_uvar(u64::from(index), 32);
            }
            GlobalSet(index) => {
                writer.push(0x24);
                writer.write_uvar(u64::from(index), 32);
            }

            I32Load { offset } => {
                writer.push(0x28);
                encode_memarg(writer, offset);
            }
            I64Load { offset } => {
                writer.push(0x29);
                encode_memarg(writer, offset);
            }
            F32Load { offset } => {
                writer.push(0x2a);
                encode_memarg(writer, offset);
            }
            F64Load { offset } => {
                writer.push(0x2b);
                encode_memarg(writer, offset);
            }
            I32Store { offset } => {
                writer.push(0x36);
                encode_memarg(writer, offset);
            }
            I64Store { offset } => {
                writer.push(0x37);
                encode_memarg(writer, offset);
            }
            F32Store { offset } => {
                writer.push(0x38);
                encode_memarg(writer, offset);
            }
            F64Store { offset } => {
                writer.push(0x39);
                encode_memarg(writer, offset);
            }

            I32Const(value) => {
                writer.push(0x41);
                writer.write_svar(i64::from(value), 32);
            }
            I64Const(value) => {
                writer.push(0x42);
                writer.write_svar(value, 64);
            }
            F32Const(value) => {
                writer.push(0x43);
                writer.write_bytes(&value.to_le_bytes());
            }
            F64Const(value) => {
                writer.push(0x44);
                writer.write_bytes(&value.to_le_bytes());
            }

            I32Eqz => writer.push(0x45),
            I32Eq => writer.push(0x46),
            I32Ne => writer.push(0x47),
            I32LtS => writer.push(0x48),
            I32GtS => writer.push(0x4a),
            I32LeS => writer.push(0x4c),
            I32GeS => writer.push(0x4e),
            I64Eq => writer.push(0x51),
            I64Ne => writer.push(0x52),
            I64LtS => writer.push(0x53),
            I64GtS => writer.push(0x55),
            I64LeS => writer.push(0x57),
            I64GeS => writer.push(0x59),
            F32Eq => writer.push(0x5b),
            F32Ne => writer.push(0x5c),
            F32Lt => writer.push(0x5d),
            F32Gt => writer.push(0x5e),
            F32Le => writer.push(0x5f),
            F32Ge => writer.push(0x60),
            F64Eq => writer.push(0x61),
            F64Ne => writer.push(0x62),
            F64Lt => writer.push(0x63),
            F64Gt => writer.push(0x64),
            F64Le => writer.push(0x65),
            F64Ge => writer.push(0x66),

            I32Add => writer.push(0x6a),
            I32Sub => writer.push(0x6b),
            I32Mul => writer.push(0x6c),
            I32DivS => writer.push(0x6d),
            I32RemS => writer.push(0x6f),
            I64Add => writer.push(0x7c),
            I64Sub => writer.push(0x7d),
            I64Mul => writer.push(0x7e),
            I64DivS => writer.push(0x7f),
            I64RemS => writer.push(0x81),
            F32Neg => writer.push(0x8c),
            F32Add => writer.push(0x92),
            F32Sub => writer.push(0x93),
            F32Mul => writer.push(0x94),
            F32Div => writer.push(0x95),
            F64Neg => writer.push(0x9a),
            F64Add => writer.push(0xa0),
            F64Sub => writer.push(0xa1),
            F64Mul => writer.push(0xa2),
            F64Div => writer.push(0xa3),
        }
    }
}

/// A section knows its id; the module frames its payload.
pub trait Section: Encode {
    fn id(&self) -> u8;
}

/// Entry-counting byte sink shared by every section builder.
#[derive(Debug, Default)]
struct SectionSink {
    entries: Writer,
    count: u32,
}

impl SectionSink {
    fn encode(&self, writer: &mut Writer) {
        writer.write_uvar(u64::from(self.count), 32);
        writer.write_bytes(self.entries.as_slice());
    }
}

#[derive(Debug, Default)]
pub struct TypeSection {
    sink: SectionSink,
}

impl TypeSection {
    pub fn new() -> TypeSection {
        TypeSection::default()
    }

    /// Number of types added so far; doubles as the next type index.
    pub fn len(&self) -> u32 {
        self.sink.count
    }

    pub fn is_empty(&self) -> bool {
        self.sink.count == 0
    }

    pub fn function(
        &mut self,
        params: impl IntoIterator<Item = ValType>,
        results: impl IntoIterator<Item = ValType>,
    ) {
        let params: Vec<ValType> = params.into_iter().collect();
        let results: Vec<ValType> = results.into_iter().collect();
        let writer = &mut self.sink.entries;
        writer.push(0x60);
        writer.write_uvar(params.len() as u64, 32);
        for param in params {
            writer.write(&param);
        }
        writer.write_uvar(results.len() as u64, 32);
        for result in results {
            writer.write(&result);
        }
        self.sink.count += 1;
    }
}

impl Encode for TypeSection {
    fn encode(&self, writer: &mut Writer) {
        self.sink.encode(writer);
    }
}

impl Section for TypeSection {
    fn id(&self) -> u8 {
        1
    }
}

#[derive(Debug, Default)]
pub struct ImportSection {
    sink: SectionSink,
}

impl ImportSection {
    pub fn new() -> ImportSection {
        ImportSection::default()
    }

    pub fn len(&self) -> u32 {
        self.sink.count
    }

    pub fn is_empty(&self) -> bool {
        self.sink.count == 0
    }

    pub fn function(&mut self, module: &str, name: &str, type_index: u32) {
        let writer = &mut self.sink.entries;
        writer.write_str(module);
        writer.write_str(name);
        writer.push(0x00);
        writer.write_uvar(u64::from(type_index), 32);
        self.sink.count += 1;
    }
}

impl Encode for ImportSection {
    fn encode(&self, writer: &mut Writer) {
        self.sink.encode(writer);
    }
}

impl Section for ImportSection {
    fn id(&self) -> u8 {
        2
    }
}

#[derive(Debug, Default)]
pub struct FunctionSection {
    sink: SectionSink,
}

impl FunctionSection {
    pub fn new() -> FunctionSection {
        FunctionSection::default()
    }

    pub fn len(&self) -> u32 {
        self.sink.count
    }

    pub fn is_empty(&self) -> bool {
        self.sink.count == 0
    }

    pub fn function(&mut self, type_index: u32) {
        self.sink.entries.write_uvar(u64::from(type_index), 32);
        self.sink.count += 1;
    }
}

impl Encode for FunctionSection {
    fn encode(&self, writer: &mut Writer) {
        self.sink.encode(writer);
    }
}

impl Section for FunctionSection {
    fn id(&self) -> u8 {
        3
    }
}

#[derive(Debug, Default)]
pub struct MemorySection {
    sink: SectionSink,
}

impl MemorySection {
    pub fn new() -> MemorySection {
        MemorySection::default()
    }

    pub fn is_empty(&self) -> bool {
        self.sink.count == 0
    }

    /// Memory with a minimum page count and no maximum.
    pub fn memory(&mut self, min_pages: u64) {
        let writer = &mut self.sink.entries;
        writer.push(0x00);
        writer.write_uvar(min_pages, 32);
        self.sink.count += 1;
    }
}

impl Encode for MemorySection {
    fn encode(&self, writer: &mut Writer) {
        self.sink.encode(writer);
    }
}

impl Section for MemorySection {
    fn id(&self) -> u8 {
        5
    }
}

#[derive(Debug, Default)]
pub struct GlobalSection {
    sink: SectionSink,
}

impl GlobalSection {
    pub fn new() -> GlobalSection {
        GlobalSection::default()
    }

    pub fn len(&self) -> u32 {
        self.sink.count
    }

    pub fn is_empty(&self) -> bool {
        self.sink.count == 0
    }

    pub fn global(&mut self, ty: ValType, mutable: bool, init: &Instruction) {
        let writer = &mut self.sink.entries;
        writer.write(&ty);
        writer.push(if mutable { 0x01 } else { 0x00 });
        writer.write(init);
        writer.write(&Instruction::End);
        self.sink.count += 1;
    }
}

impl Encode for GlobalSection {
    fn encode(&self, writer: &mut Writer) {
        self.sink.encode(writer);
    }
}

impl Section for GlobalSection {
    fn id(&self) -> u8 {
        6
    }
}

#[derive(Debug, Default)]
pub struct ExportSection {
    sink: SectionSink,
}

impl ExportSection {
    pub fn new() -> ExportSection {
        ExportSection::default()
    }

    pub fn is_empty(&self) -> bool {
        self.sink.count == 0
    }

    pub fn export(&mut self, name: &str, kind: ExportKind, index: u32) {
        let writer = &mut self.sink.entries;
        writer.write_str(name);
        writer.write(&kind);
        writer.write_uvar(u64::from(index), 32);
        self.sink.count += 1;
    }
}

impl Encode for ExportSection {
    fn encode(&self, writer: &mut Writer) {
        self.sink.encode(writer);
    }
}

impl Section for ExportSection {
    fn id(&self) -> u8 {
        7
    }
}

/// Body of a single function: local declarations plus instructions.
/// The caller is responsible for the terminating [`Instruction::End`].
#[derive(Debug, Default)]
pub struct Function {
    locals: Vec<ValType>,
    body: Writer,
}

impl Function {
    pub fn new(locals: Vec<ValType>) -> Function {
        Function {
            locals,
            body: Writer::new(),
        }
    }

    pub fn instruction(&mut self, instruction: &Instruction) -> &mut Function {
        self.body.write(instruction);
        self
    }
}

impl Encode for Function {
    fn encode(&self, writer: &mut Writer) {
        let mut body = Writer::new();
        body.write_uvar(self.locals.len() as u64, 32);
        for local in &self.locals {
            body.write_uvar(1, 32);
            body.write(local);
        }
        body.write_bytes(self.body.as_slice());
        writer.write_uvar(body.len() as u64, 32);
        writer.write_bytes(body.as_slice());
    }
}

#[derive(Debug, Default)]
pub struct CodeSection {
    sink: SectionSink,
}

impl CodeSection {
    pub fn new() -> CodeSection {
        CodeSection::default()
    }

    pub fn is_empty(&self) -> bool {
        self.sink.count == 0
    }

    pub fn function(&mut self, function: &Function) {
        self.sink.entries.write(function);
        self.sink.count += 1;
    }
}

impl Encode for CodeSection {
    fn encode(&self, writer: &mut Writer) {
        self.sink.encode(writer);
    }
}

impl Section for CodeSection {
    fn id(&self) -> u8 {
        10
    }
}

/// Assembles the final module byte sequence: magic, version, then each
/// section framed with its id and payload size.
#[derive(Debug)]
pub struct Module {
    writer: Writer,
}

impl Module {
    pub fn new() -> Module {
        let mut writer = Writer::new();
        writer.write_bytes(&[0x00, 0x61, 0x73, 0x6d]);
        writer.write_u32(1);
        Module { writer }
    }

    pub fn section(&mut self, section: &impl Section) -> &mut Module {
        let mut payload = Writer::new();
        section.encode(&mut payload);
        self.writer.push(section.id());
        self.writer.write_uvar(payload.len() as u64, 32);
        self.writer.write_bytes(payload.as_slice());
        self
    }

    pub fn finish(self) -> Vec<u8> {
        self.writer.into_bytes()
    }
}

impl Default for Module {
    fn default() -> Self {
        Module::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_module_is_magic_and_version() {
        let module = Module::new();
        assert_eq!(
            module.finish(),
            vec![0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn const_function_module_matches_known_encoding() {
        // main : () -> i32, body `i32.const 42`.
        let mut module = Module::new();

        let mut types = TypeSection::new();
        let type_index = types.len();
        types.function([], [ValType::I32]);
        module.section(&types);

        let mut functions = FunctionSection::new();
        functions.function(type_index);
        module.section(&functions);

        let mut exports = ExportSection::new();
        exports.export("main", ExportKind::Func, 0);
        module.section(&exports);

        let mut code = CodeSection::new();
        let mut main = Function::new(vec![]);
        main.instruction(&Instruction::I32Const(42));
        main.instruction(&Instruction::End);
        code.function(&main);
        module.section(&code);

        assert_eq!(
            module.finish(),
            vec![
                0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00, // header
                0x01, 0x05, 0x01, 0x60, 0x00, 0x01, 0x7f, // type section
                0x03, 0x02, 0x01, 0x00, // function section
                0x07, 0x08, 0x01, 0x04, 0x6d, 0x61, 0x69, 0x6e, 0x00, 0x00, // exports
                0x0a, 0x06, 0x01, 0x04, 0x00, 0x41, 0x2a, 0x0b, // code
            ]
        );
    }

    #[test]
    fn locals_are_declared_one_run_each() {
        let mut function = Function::new(vec![ValType::I32, ValType::F64]);
        function.instruction(&Instruction::End);

        let mut writer = Writer::new();
        writer.write(&function);
        // size, local-run count, (1, i32), (1, f64), end opcode
        assert_eq!(writer.as_slice(), &[0x06, 0x02, 0x01, 0x7f, 0x01, 0x7c, 0x0b]);
    }

    #[test]
    fn instructions_with_immediates_encode_compactly() {
        let mut writer = Writer::new();
        writer.write(&Instruction::I32Const(-1));
        writer.write(&Instruction::LocalGet(3));
        writer.write(&Instruction::Call(130));
        assert_eq!(
            writer.as_slice(),
            &[0x41, 0x7f, 0x20, 0x03, 0x10, 0x82, 0x01]
        );
    }

    #[test]
    fn memory_access_carries_align_and_offset() {
        let mut writer = Writer::new();
        writer.write(&Instruction::I32Store { offset: 8 });
        assert_eq!(writer.as_slice(), &[0x36, 0x00, 0x08]);
    }

    #[test]
    fn float_consts_use_fixed_width_payloads() {
        let mut writer = Writer::new();
        writer.write(&Instruction::F32Const(1.0));
        writer.write(&Instruction::F64Const(1.0));
        assert_eq!(writer.len(), 1 + 4 + 1 + 8);
        assert_eq!(&writer.as_slice()[1..5], &1.0f32.to_le_bytes());
        assert_eq!(&writer.as_slice()[6..14], &1.0f64.to_le_bytes());
    }

    #[test]
    fn globals_carry_type_mutability_and_init() {
        let mut globals = GlobalSection::new();
        globals.global(ValType::I32, true, &Instruction::I32Const(7));

        let mut writer = Writer::new();
        globals.encode(&mut writer);
        assert_eq!(writer.as_slice(), &[0x01, 0x7f, 0x01, 0x41, 0x07, 0x0b]);
    }
}
