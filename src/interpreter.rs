/// Step interpreter over the lowered statement IR.
///
/// The heap is an arena of cells addressed by index - address 0 is reserved
/// as null, a freed slot is an empty vector and is handed out again by the
/// next allocation. Every value is either an immediate (`Value`) or an arena
/// address (`Pointer`), and every cell follows the `[Tag, Size, Refs,
/// fields...]` protocol, so a memory snapshot is a plain nested array the
/// visualizer can consume without decoding anything.
///
/// One `step` executes exactly one instruction; calls are split into a
/// `Call` and a `TakeReturn` instruction so frame entry and exit are each
/// observable. The interpreter is `Clone` - the session keeps a history of
/// clones to implement exact step-back.
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::rc::Rc;

use serde::Serialize;

use crate::ast::BinOp;
use crate::error::RuntimeError;
use crate::lower::{Def, Operand, Stmt, HEADER_FIELDS, REFS_FIELD, SIZE_FIELD, TAG_FIELD};
use crate::resolver::display_name;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Data {
    Value(i64),
    Pointer(usize),
}

impl Data {
    fn is_ptr(&self) -> bool {
        matches!(self, Data::Pointer(_))
    }
}

// ---------------------------------------------------------------------------
// Instructions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum Instr {
    IfElse(Vec<(Operand, Vec<Instr>)>),
    Return(Operand),
    Print(Operand),
    AllocCell(String, u8),
    Assign(String, Operand),
    SetField(String, i64, Operand),
    GetField(String, i64, Operand),
    BinOp(String, BinOp, Operand, Operand),
    TagCheck(String, bool, Operand, i64),
    Call(String, Vec<Operand>),
    TakeReturn(String),
    DropReuse(String, String),
    Inc(String),
    Dec(String),
}

#[derive(Debug, Clone)]
pub struct Proc {
    pub id: String,
    pub args: Vec<String>,
    pub body: Vec<Instr>,
}

impl Proc {
    pub fn from_def(def: &Def) -> Self {
        Proc {
            id: def.id.clone(),
            args: def.args.clone(),
            body: convert_stmts(&def.body),
        }
    }
}

fn convert_stmts(stmts: &[Stmt]) -> Vec<Instr> {
    let mut instrs = Vec::with_capacity(stmts.len());
    for stmt in stmts {
        match stmt {
            Stmt::IfElse(branches) => instrs.push(Instr::IfElse(
                branches
                    .iter()
                    .map(|(cond, body)| (cond.clone(), convert_stmts(body)))
                    .collect(),
            )),
            Stmt::Return(op) => instrs.push(Instr::Return(op.clone())),
            Stmt::Print(op) => instrs.push(Instr::Print(op.clone())),
            Stmt::AllocCell(id, size) => instrs.push(Instr::AllocCell(id.clone(), *size)),
            Stmt::Assign(id, op) => instrs.push(Instr::Assign(id.clone(), op.clone())),
            Stmt::SetField(id, i, op) => {
                instrs.push(Instr::SetField(id.clone(), *i, op.clone()))
            }
            Stmt::GetField(id, i, op) => {
                instrs.push(Instr::GetField(id.clone(), *i, op.clone()))
            }
            Stmt::BinOp(id, op, lhs, rhs) => {
                instrs.push(Instr::BinOp(id.clone(), *op, lhs.clone(), rhs.clone()))
            }
            Stmt::TagCheck(id, heap, op, tag) => {
                instrs.push(Instr::TagCheck(id.clone(), *heap, op.clone(), *tag))
            }
            Stmt::CallAssign(id, fid, args) => {
                // Split so that frame entry and the assignment of the returned
                // value are separate steps.
                instrs.push(Instr::Call(fid.clone(), args.clone()));
                instrs.push(Instr::TakeReturn(id.clone()));
            }
            Stmt::DropReuse(id, src) => {
                instrs.push(Instr::DropReuse(id.clone(), src.clone()))
            }
            Stmt::Inc(id) => instrs.push(Instr::Inc(id.clone())),
            Stmt::Dec(id) => instrs.push(Instr::Dec(id.clone())),
        }
    }
    instrs
}

// ---------------------------------------------------------------------------
// Result rendering
// ---------------------------------------------------------------------------

/// Structural type shapes used to print heap values as constructor terms.
#[derive(Debug, Clone)]
pub enum Shape {
    Int,
    Enum(String),
    Tuple(Vec<Shape>),
}

#[derive(Debug, Clone, Default)]
pub struct RenderTable {
    /// Enum name → (constructor name, field shapes) in tag order.
    pub enums: HashMap<String, Vec<(String, Vec<Shape>)>>,
    /// Shape of `main`'s result.
    pub result: Option<Shape>,
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapData {
    pub is_ptr: bool,
    pub val: i64,
}

impl From<Data> for SnapData {
    fn from(data: Data) -> Self {
        match data {
            Data::Value(v) => SnapData {
                is_ptr: false,
                val: v,
            },
            Data::Pointer(p) => SnapData {
                is_ptr: true,
                val: p as i64,
            },
        }
    }
}

/// Pure view of the interpreter state for visualization. The first three
/// fields of every heap cell are always Tag, Size and Refs, in that order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemorySnapshot {
    pub variables: BTreeMap<String, SnapData>,
    pub heap: Vec<Vec<SnapData>>,
    pub call_stack: Vec<String>,
}

impl MemorySnapshot {
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

// ---------------------------------------------------------------------------
// Interpreter
// ---------------------------------------------------------------------------

/// What a single step did - drives the `run_until_*` loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepEvent {
    Quiet,
    /// Any write to the heap: allocation, field write, refcount change,
    /// free or cell reuse.
    HeapWrite,
    Call,
    Returned,
    Finished,
}

#[derive(Clone)]
pub struct Interpreter {
    procs: Rc<HashMap<String, Proc>>,
    render: Rc<RenderTable>,
    heap: Vec<Vec<Data>>,
    instrs: VecDeque<Instr>,
    instr_stack: Vec<VecDeque<Instr>>,
    locals: HashMap<String, Data>,
    locals_stack: Vec<HashMap<String, Data>>,
    call_stack: Vec<String>,
    return_value: Option<Data>,
    output: Vec<String>,
    alloc_count: usize,
    steps: usize,
}

impl Interpreter {
    pub fn new(defs: &[Def], render: RenderTable) -> Self {
        let procs = defs
            .iter()
            .map(|def| (def.id.clone(), Proc::from_def(def)))
            .collect();
        Interpreter {
            procs: Rc::new(procs),
            render: Rc::new(render),
            // Slot 0 is reserved so address 0 can serve as null.
            heap: vec![Vec::new()],
            instrs: VecDeque::new(),
            instr_stack: Vec::new(),
            locals: HashMap::new(),
            locals_stack: Vec::new(),
            call_stack: Vec::new(),
            return_value: None,
            output: Vec::new(),
            alloc_count: 0,
            steps: 0,
        }
    }

    pub fn start(&mut self, entry: &str) -> Result<(), RuntimeError> {
        self.enter_proc(entry, Vec::new())
    }

    pub fn is_done(&self) -> bool {
        self.instrs.is_empty() && self.instr_stack.is_empty()
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn alloc_count(&self) -> usize {
        self.alloc_count
    }

    pub fn output(&self) -> String {
        self.output.join("\n")
    }

    pub fn call_stack(&self) -> &[String] {
        &self.call_stack
    }

    pub fn frame_depth(&self) -> usize {
        self.instr_stack.len()
    }

    // -----------------------------------------------------------------------
    // Stepping
    // -----------------------------------------------------------------------

    pub fn step(&mut self) -> Result<StepEvent, RuntimeError> {
        let Some(instr) = self.instrs.pop_front() else {
            return Ok(StepEvent::Finished);
        };
        self.steps += 1;

        match instr {
            Instr::IfElse(branches) => {
                for (cond, body) in branches {
                    if self.truthy(&cond)? {
                        // Splice the chosen branch ahead of the remaining code.
                        let mut spliced: VecDeque<Instr> = body.into();
                        spliced.extend(self.instrs.drain(..));
                        self.instrs = spliced;
                        break;
                    }
                }
                Ok(StepEvent::Quiet)
            }

            Instr::Return(op) => {
                self.return_value = Some(self.operand(&op)?);
                self.call_stack.pop();
                match (self.instr_stack.pop(), self.locals_stack.pop()) {
                    (Some(instrs), Some(locals)) => {
                        self.instrs = instrs;
                        self.locals = locals;
                    }
                    _ => {
                        self.instrs.clear();
                        self.locals.clear();
                    }
                }
                Ok(StepEvent::Returned)
            }

            Instr::Print(op) => {
                let data = self.operand(&op)?;
                let line = self.render_value(data);
                self.output.push(line);
                Ok(StepEvent::Quiet)
            }

            Instr::AllocCell(id, size) => {
                let addr = self.malloc(size as usize + HEADER_FIELDS as usize);
                self.locals.insert(id, Data::Pointer(addr));
                self.alloc_count += 1;
                Ok(StepEvent::HeapWrite)
            }

            Instr::Assign(id, op) => {
                let data = self.operand(&op)?;
                self.locals.insert(id, data);
                Ok(StepEvent::Quiet)
            }

            Instr::SetField(id, index, op) => {
                let addr = self.pointer_local(&id)?;
                let data = self.operand(&op)?;
                let cell = self.cell_mut(addr)?;
                let index = index as usize;
                if index >= cell.len() {
                    return Err(RuntimeError::InvariantViolation(format!(
                        "field {} out of bounds for cell {}",
                        index, addr
                    )));
                }
                cell[index] = data;
                Ok(StepEvent::HeapWrite)
            }

            Instr::GetField(id, index, op) => {
                let data = self.operand(&op)?;
                let Data::Pointer(addr) = data else {
                    return Err(RuntimeError::InvariantViolation(format!(
                        "projection from non-pointer value in '{}'",
                        id
                    )));
                };
                let cell = self.cell(addr)?;
                let index = index as usize;
                if index >= cell.len() {
                    return Err(RuntimeError::InvariantViolation(format!(
                        "field {} out of bounds for cell {}",
                        index, addr
                    )));
                }
                let value = cell[index];
                self.locals.insert(id, value);
                Ok(StepEvent::Quiet)
            }

            Instr::BinOp(id, op, lhs, rhs) => {
                let lhs = self.int_operand(&lhs)?;
                let rhs = self.int_operand(&rhs)?;
                let value = match op {
                    BinOp::Add => lhs.wrapping_add(rhs),
                    BinOp::Sub => lhs.wrapping_sub(rhs),
                    BinOp::Mul => lhs.wrapping_mul(rhs),
                    // Truncating division, sign-following modulo.
                    BinOp::Div => {
                        if rhs == 0 {
                            return Err(RuntimeError::DivisionByZero);
                        }
                        lhs.wrapping_div(rhs)
                    }
                    BinOp::Mod => {
                        if rhs == 0 {
                            return Err(RuntimeError::ModuloByZero);
                        }
                        lhs.wrapping_rem(rhs)
                    }
                };
                self.locals.insert(id, Data::Value(value));
                Ok(StepEvent::Quiet)
            }

            Instr::TagCheck(id, heap_check, op, tag) => {
                let data = self.operand(&op)?;
                let result = if heap_check {
                    match data {
                        Data::Pointer(addr) => self.cell(addr)?[TAG_FIELD as usize]
                            == Data::Value(tag),
                        Data::Value(_) => false,
                    }
                } else {
                    data == Data::Value(tag)
                };
                self.locals.insert(id, Data::Value(result as i64));
                Ok(StepEvent::Quiet)
            }

            Instr::Call(fid, args) => {
                let mut passed = Vec::with_capacity(args.len());
                for arg in &args {
                    passed.push(self.operand(arg)?);
                }
                self.enter_proc(&fid, passed)?;
                Ok(StepEvent::Call)
            }

            Instr::TakeReturn(id) => {
                let value = self.return_value.take().ok_or_else(|| {
                    RuntimeError::InvariantViolation("no return value to take".to_string())
                })?;
                self.locals.insert(id, value);
                Ok(StepEvent::Quiet)
            }

            Instr::DropReuse(id, src) => {
                let addr = self.pointer_local(&src)?;
                let refs = self.refcount(addr)?;
                if refs == 1 {
                    // Uniquely owned: release the fields, keep the shell.
                    let size = self.cell_size(addr)?;
                    for i in 0..size {
                        let field = self.cell(addr)?[HEADER_FIELDS as usize + i];
                        self.release(field)?;
                    }
                    self.locals.insert(id, Data::Pointer(addr));
                } else {
                    self.set_refcount(addr, refs - 1)?;
                    self.locals.insert(id, Data::Value(0));
                }
                Ok(StepEvent::HeapWrite)
            }

            Instr::Inc(id) => {
                let data = self.local(&id)?;
                if let Data::Pointer(addr) = data {
                    let refs = self.refcount(addr)?;
                    self.set_refcount(addr, refs + 1)?;
                    Ok(StepEvent::HeapWrite)
                } else {
                    Ok(StepEvent::Quiet)
                }
            }

            Instr::Dec(id) => {
                let data = self.local(&id)?;
                if data.is_ptr() {
                    self.release(data)?;
                    Ok(StepEvent::HeapWrite)
                } else {
                    Ok(StepEvent::Quiet)
                }
            }
        }
    }

    const STEP_LIMIT: usize = 50_000_000;

    pub fn run_to_completion(&mut self) -> Result<(), RuntimeError> {
        let limit = self.steps + Self::STEP_LIMIT;
        while !self.is_done() {
            self.step()?;
            if self.steps > limit {
                return Err(RuntimeError::StepLimit);
            }
        }
        Ok(())
    }

    pub fn run_until_heap_write(&mut self) -> Result<(), RuntimeError> {
        let limit = self.steps + Self::STEP_LIMIT;
        while !self.is_done() {
            if self.step()? == StepEvent::HeapWrite {
                break;
            }
            if self.steps > limit {
                return Err(RuntimeError::StepLimit);
            }
        }
        Ok(())
    }

    pub fn run_until_return(&mut self) -> Result<(), RuntimeError> {
        let depth = self.instr_stack.len();
        let limit = self.steps + Self::STEP_LIMIT;
        while !self.is_done() {
            self.step()?;
            if self.instr_stack.len() < depth {
                break;
            }
            if self.steps > limit {
                return Err(RuntimeError::StepLimit);
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Heap primitives
    // -----------------------------------------------------------------------

    fn malloc(&mut self, width: usize) -> usize {
        for addr in 1..self.heap.len() {
            if self.heap[addr].is_empty() {
                self.heap[addr] = vec![Data::Value(0); width];
                return addr;
            }
        }
        self.heap.push(vec![Data::Value(0); width]);
        self.heap.len() - 1
    }

    fn cell(&self, addr: usize) -> Result<&Vec<Data>, RuntimeError> {
        match self.heap.get(addr) {
            Some(cell) if !cell.is_empty() && addr != 0 => Ok(cell),
            _ => Err(RuntimeError::InvariantViolation(format!(
                "reference to dead cell {}",
                addr
            ))),
        }
    }

    fn cell_mut(&mut self, addr: usize) -> Result<&mut Vec<Data>, RuntimeError> {
        match self.heap.get_mut(addr) {
            Some(cell) if !cell.is_empty() && addr != 0 => Ok(cell),
            _ => Err(RuntimeError::InvariantViolation(format!(
                "reference to dead cell {}",
                addr
            ))),
        }
    }

    fn refcount(&self, addr: usize) -> Result<i64, RuntimeError> {
        match self.cell(addr)?[REFS_FIELD as usize] {
            Data::Value(refs) if refs > 0 => Ok(refs),
            other => Err(RuntimeError::InvariantViolation(format!(
                "cell {} has invalid refcount {:?}",
                addr, other
            ))),
        }
    }

    fn set_refcount(&mut self, addr: usize, refs: i64) -> Result<(), RuntimeError> {
        self.cell_mut(addr)?[REFS_FIELD as usize] = Data::Value(refs);
        Ok(())
    }

    fn cell_size(&self, addr: usize) -> Result<usize, RuntimeError> {
        match self.cell(addr)?[SIZE_FIELD as usize] {
            Data::Value(size) if size >= 0 => Ok(size as usize),
            other => Err(RuntimeError::InvariantViolation(format!(
                "cell {} has invalid size {:?}",
                addr, other
            ))),
        }
    }

    /// Decrement; at zero, release the fields and return the slot to the
    /// free list.
    fn release(&mut self, data: Data) -> Result<(), RuntimeError> {
        let Data::Pointer(addr) = data else {
            return Ok(());
        };
        let refs = self.refcount(addr)?;
        if refs == 1 {
            let size = self.cell_size(addr)?;
            for i in 0..size {
                let field = self.cell(addr)?[HEADER_FIELDS as usize + i];
                self.release(field)?;
            }
            self.heap[addr] = Vec::new();
        } else {
            self.set_refcount(addr, refs - 1)?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Operand evaluation
    // -----------------------------------------------------------------------

    fn local(&self, id: &str) -> Result<Data, RuntimeError> {
        self.locals.get(id).copied().ok_or_else(|| {
            RuntimeError::InvariantViolation(format!("variable '{}' not in scope", id))
        })
    }

    fn pointer_local(&self, id: &str) -> Result<usize, RuntimeError> {
        match self.local(id)? {
            Data::Pointer(addr) => Ok(addr),
            Data::Value(v) => Err(RuntimeError::InvariantViolation(format!(
                "expected '{}' to hold a pointer, found value {}",
                id, v
            ))),
        }
    }

    fn operand(&self, op: &Operand) -> Result<Data, RuntimeError> {
        match op {
            Operand::Var(id) => self.local(id),
            Operand::Int(i) | Operand::Raw(i) => Ok(Data::Value(*i)),
            Operand::Not(id) => Ok(Data::Value(
                matches!(self.local(id)?, Data::Value(0)) as i64,
            )),
        }
    }

    fn int_operand(&self, op: &Operand) -> Result<i64, RuntimeError> {
        match self.operand(op)? {
            Data::Value(v) => Ok(v),
            Data::Pointer(p) => Err(RuntimeError::InvariantViolation(format!(
                "arithmetic on pointer <{}>",
                p
            ))),
        }
    }

    fn truthy(&self, op: &Operand) -> Result<bool, RuntimeError> {
        Ok(self.operand(op)? != Data::Value(0))
    }

    fn enter_proc(&mut self, fid: &str, passed: Vec<Data>) -> Result<(), RuntimeError> {
        let proc = self.procs.get(fid).ok_or_else(|| {
            RuntimeError::InvariantViolation(format!("call to unknown function '{}'", fid))
        })?;
        if proc.args.len() != passed.len() {
            return Err(RuntimeError::InvariantViolation(format!(
                "call to '{}' with {} arguments, expected {}",
                fid,
                passed.len(),
                proc.args.len()
            )));
        }
        self.call_stack.push(proc.id.clone());
        self.instr_stack.push(std::mem::take(&mut self.instrs));
        self.locals_stack.push(std::mem::take(&mut self.locals));
        self.instrs = proc.body.clone().into();
        self.locals = proc.args.iter().cloned().zip(passed).collect();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Rendering
    // -----------------------------------------------------------------------

    /// Render a runtime value as a constructor term using the program's type
    /// shapes: `Cons(3, Cons(2, Cons(1, Nil)))`, bare names for unboxed
    /// constructors, parenthesized tuples, plain integers.
    pub fn render_value(&self, data: Data) -> String {
        match &self.render.result {
            Some(shape) => self.render_shaped(data, shape),
            None => self.render_shaped(data, &Shape::Int),
        }
    }

    fn render_shaped(&self, data: Data, shape: &Shape) -> String {
        match (shape, data) {
            (Shape::Int, Data::Value(v)) => v.to_string(),
            (Shape::Enum(name), Data::Value(tag)) => self
                .ctor_entry(name, tag)
                .map(|(ctor, _)| ctor)
                .unwrap_or_else(|| format!("<tag {}>", tag)),
            (Shape::Enum(name), Data::Pointer(addr)) => {
                let Ok(cell) = self.cell(addr) else {
                    return format!("<dead {}>", addr);
                };
                let Data::Value(tag) = cell[TAG_FIELD as usize] else {
                    return format!("<cell {}>", addr);
                };
                match self.ctor_entry(name, tag) {
                    Some((ctor, fields)) => {
                        let rendered: Vec<String> = fields
                            .iter()
                            .enumerate()
                            .map(|(i, fs)| {
                                self.render_shaped(cell[HEADER_FIELDS as usize + i], fs)
                            })
                            .collect();
                        format!("{}({})", ctor, rendered.join(", "))
                    }
                    None => format!("<tag {}>", tag),
                }
            }
            (Shape::Tuple(shapes), Data::Pointer(addr)) => {
                let Ok(cell) = self.cell(addr) else {
                    return format!("<dead {}>", addr);
                };
                let rendered: Vec<String> = shapes
                    .iter()
                    .enumerate()
                    .map(|(i, fs)| self.render_shaped(cell[HEADER_FIELDS as usize + i], fs))
                    .collect();
                format!("({})", rendered.join(", "))
            }
            (Shape::Tuple(_), Data::Value(_)) => "()".to_string(),
            (Shape::Int, Data::Pointer(addr)) => format!("<{}>", addr),
        }
    }

    fn ctor_entry(&self, enum_name: &str, tag: i64) -> Option<(String, Vec<Shape>)> {
        self.render
            .enums
            .get(enum_name)
            .and_then(|ctors| ctors.get(tag as usize))
            .cloned()
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    pub fn memory_snapshot(&self) -> MemorySnapshot {
        let mut variables = BTreeMap::new();
        for (name, data) in &self.locals {
            variables.insert(display_name(name).to_string(), SnapData::from(*data));
        }
        MemorySnapshot {
            variables,
            heap: self
                .heap
                .iter()
                .map(|cell| cell.iter().map(|d| SnapData::from(*d)).collect())
                .collect(),
            call_stack: self.call_stack.clone(),
        }
    }

    /// Heap audit: every reachable cell must be live with a positive
    /// refcount, and no reference may target a freed slot.
    pub fn audit_heap(&self) -> Result<(), RuntimeError> {
        let mut roots: Vec<Data> = Vec::new();
        roots.extend(self.locals.values().copied());
        for frame in &self.locals_stack {
            roots.extend(frame.values().copied());
        }
        if let Some(ret) = self.return_value {
            roots.push(ret);
        }

        let mut visited = vec![false; self.heap.len()];
        let mut queue: VecDeque<usize> = VecDeque::new();
        for root in roots {
            if let Data::Pointer(addr) = root {
                queue.push_back(addr);
            }
        }
        while let Some(addr) = queue.pop_front() {
            if addr < visited.len() && visited[addr] {
                continue;
            }
            let cell = self.cell(addr)?;
            self.refcount(addr)?;
            visited[addr] = true;
            let size = self.cell_size(addr)?;
            for i in 0..size {
                if let Data::Pointer(child) = cell[HEADER_FIELDS as usize + i] {
                    queue.push_back(child);
                }
            }
        }
        Ok(())
    }

    /// Number of live (allocated, unfreed) cells.
    pub fn live_cells(&self) -> usize {
        self.heap.iter().skip(1).filter(|c| !c.is_empty()).count()
    }
}

impl fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:=^50}", " Interpreter State ")?;

        writeln!(f, "Heap:")?;
        let width = self.heap.len().to_string().len();
        for (addr, cell) in self.heap.iter().enumerate() {
            if cell.is_empty() {
                continue;
            }
            let fields: Vec<String> = cell
                .iter()
                .map(|d| match d {
                    Data::Value(v) => v.to_string(),
                    Data::Pointer(p) => format!("<{}>", p),
                })
                .collect();
            writeln!(f, "  {:>width$}  [{}]", addr, fields.join(", "))?;
        }

        writeln!(f, "Locals:")?;
        let mut names: Vec<&String> = self.locals.keys().collect();
        names.sort();
        for name in names {
            let data = match self.locals[name] {
                Data::Value(v) => v.to_string(),
                Data::Pointer(p) => format!("<{}>", p),
            };
            writeln!(f, "  {} = {}", display_name(name), data)?;
        }

        if let Some(current) = self.call_stack.last() {
            writeln!(f, "In function '{}'", current)?;
        }
        writeln!(f, "Call stack: {:?}", self.call_stack)?;
        writeln!(f, "Pending instructions: {}", self.instrs.len())?;
        writeln!(f, "Steps taken: {}", self.steps)?;
        if self.is_done() {
            writeln!(f, "Status: completed")?;
        }

        Ok(())
    }
}
