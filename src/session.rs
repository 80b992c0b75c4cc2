/// The crate boundary: compilation and the interpreter session.
///
/// `compile` runs the whole pipeline - lex, parse, resolve, type-check,
/// fip validation, ANF, reuse, refcount, lowering, C emission - and returns
/// a `CompiledProgram` holding the generated code and the intermediate
/// dumps. The first failing stage short-circuits the rest.
///
/// `Session` owns at most one running program. `start` (re)compiles and
/// (re)initializes, discarding any previous session state; the step and run
/// operations each record one history entry so `step_back` undoes exactly
/// one of them, restoring heap contents, refcounts and the call stack bit
/// for bit.
use crate::anf;
use crate::codegen::Codegen;
use crate::error::{CompileError, Diagnostic, RuntimeError};
use crate::interpreter::{Interpreter, MemorySnapshot, RenderTable, Shape};
use crate::lexer::Lexer;
use crate::lower::{self, Def};
use crate::parser::Parser;
use crate::rc;
use crate::resolver::{self, SymbolTable};
use crate::reuse;
use crate::typechecker::{self, TypedProgram};
use crate::types::{Type, ValueType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Typed,
    Anf,
    Reuse,
    RefCount,
}

#[derive(Debug, Clone, Copy)]
pub struct CompileOptions {
    /// Infer borrowed parameters; when off, every parameter is owned and
    /// refcounts match naive in-degree.
    pub infer_ownership: bool,
    /// Run the reuse pass on fip functions; when off, fip functions compile
    /// like ordinary ones (the uniqueness proof still runs).
    pub insert_reuse: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            infer_ownership: true,
            insert_reuse: true,
        }
    }
}

#[derive(Debug)]
pub struct CompiledProgram {
    pub defs: Vec<Def>,
    render: RenderTable,
    typed_dump: String,
    anf_dump: String,
    reuse_dump: String,
    rc_dump: String,
    c_code: String,
}

impl CompiledProgram {
    pub fn generated_code(&self) -> &str {
        &self.c_code
    }

    /// Fresh interpreter over this program; call `start` to enter `main`.
    pub fn interpreter(&self) -> Interpreter {
        Interpreter::new(&self.defs, self.render.clone())
    }

    pub fn intermediate_dump(&self, stage: Stage) -> &str {
        match stage {
            Stage::Typed => &self.typed_dump,
            Stage::Anf => &self.anf_dump,
            Stage::Reuse => &self.reuse_dump,
            Stage::RefCount => &self.rc_dump,
        }
    }
}

pub fn compile(source: &str) -> Result<CompiledProgram, Diagnostic> {
    compile_with(source, CompileOptions::default())
}

pub fn compile_with(source: &str, opts: CompileOptions) -> Result<CompiledProgram, Diagnostic> {
    let tokens = Lexer::new(source).tokenize()?;
    let program = Parser::new(tokens).parse()?;
    let resolved = resolver::resolve(program)?;
    let typed = typechecker::type_check(resolved)?;
    reuse::validate_fip(&typed)?;

    let lowered = anf::from_typed(&typed);
    let reused = if opts.insert_reuse {
        reuse::add_reuse(&lowered)
    } else {
        lowered.clone()
    };
    let ownership = if opts.infer_ownership {
        rc::infer_ownership(&reused)
    } else {
        rc::all_owned(&reused)
    };
    let counted = rc::insert_rc(&reused, &ownership);
    let defs = lower::translate(&counted);
    let c_code = Codegen::new().emit(&defs);

    Ok(CompiledProgram {
        render: render_table(&typed),
        typed_dump: typechecker::dump(&typed),
        anf_dump: anf::dump(&lowered),
        reuse_dump: anf::dump(&reused),
        rc_dump: anf::dump(&counted),
        c_code,
        defs,
    })
}

fn shape_of(tp: &Type) -> Shape {
    match tp {
        Type::Int => Shape::Int,
        Type::Enum(name) => Shape::Enum(name.clone()),
    }
}

fn value_shape(ty: &ValueType) -> Shape {
    match ty {
        ValueType::Single(tp) => shape_of(tp),
        ValueType::Tuple(tps) => Shape::Tuple(tps.iter().map(shape_of).collect()),
    }
}

fn render_table(typed: &TypedProgram) -> RenderTable {
    let mut table = RenderTable::default();
    fill_enums(&typed.symbols, &mut table);
    table.result = typed
        .fns
        .iter()
        .find(|f| f.name == "main")
        .map(|f| value_shape(&f.results));
    table
}

fn fill_enums(symbols: &SymbolTable, table: &mut RenderTable) {
    for enum_name in &symbols.enum_order {
        let ctor_names = &symbols.enums[enum_name];
        let ctors = ctor_names
            .iter()
            .map(|name| {
                let info = &symbols.ctors[name];
                (name.clone(), info.fields.iter().map(shape_of).collect())
            })
            .collect();
        table.enums.insert(enum_name.clone(), ctors);
    }
}

// ---------------------------------------------------------------------------
// Interpreter session
// ---------------------------------------------------------------------------

const HISTORY_LIMIT: usize = 10_000;

#[derive(Default)]
pub struct Session {
    interpreter: Option<Interpreter>,
    history: Vec<Interpreter>,
}

impl Session {
    pub fn new() -> Self {
        Session::default()
    }

    /// (Re)initialize from source. Any previous session is discarded, even
    /// if the new source fails to compile.
    pub fn start(&mut self, source: &str) -> Result<(), Diagnostic> {
        self.interpreter = None;
        self.history.clear();

        let compiled = compile(source)?;
        if !compiled.defs.iter().any(|def| def.id == "main") {
            return Err(CompileError::UnknownFunction("main".to_string()).no_span());
        }
        let mut interpreter = compiled.interpreter();
        interpreter.start("main").map_err(Diagnostic::from)?;
        self.interpreter = Some(interpreter);
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.interpreter.is_some()
    }

    pub fn is_done(&self) -> bool {
        self.interpreter.as_ref().map_or(true, |i| i.is_done())
    }

    fn with_history<F>(&mut self, op: F) -> Result<String, Diagnostic>
    where
        F: FnOnce(&mut Interpreter) -> Result<(), RuntimeError>,
    {
        let interpreter = self
            .interpreter
            .as_mut()
            .ok_or_else(|| Diagnostic::from(RuntimeError::NoProgram))?;
        let before = interpreter.clone();
        op(interpreter).map_err(Diagnostic::from)?;
        if self.history.len() >= HISTORY_LIMIT {
            self.history.remove(0);
        }
        self.history.push(before);
        Ok(format!("{:?}", self.interpreter.as_ref().unwrap()))
    }

    pub fn step_forward(&mut self) -> Result<String, Diagnostic> {
        self.with_history(|i| i.step().map(|_| ()))
    }

    /// Restore the state immediately before the last forward operation.
    /// At the initial state this is a no-op.
    pub fn step_back(&mut self) -> Result<String, Diagnostic> {
        let interpreter = self
            .interpreter
            .as_mut()
            .ok_or_else(|| Diagnostic::from(RuntimeError::NoProgram))?;
        if let Some(previous) = self.history.pop() {
            *interpreter = previous;
        }
        Ok(format!("{:?}", interpreter))
    }

    pub fn run_until_next_mutation(&mut self) -> Result<String, Diagnostic> {
        self.with_history(|i| i.run_until_heap_write())
    }

    pub fn run_until_return(&mut self) -> Result<String, Diagnostic> {
        self.with_history(|i| i.run_until_return())
    }

    pub fn run_to_completion(&mut self) -> Result<String, Diagnostic> {
        self.with_history(|i| i.run_to_completion())
    }

    pub fn state_dump(&self) -> Result<String, Diagnostic> {
        let interpreter = self
            .interpreter
            .as_ref()
            .ok_or_else(|| Diagnostic::from(RuntimeError::NoProgram))?;
        Ok(format!("{:?}", interpreter))
    }

    /// Program-visible output accumulated since `start`.
    pub fn output(&self) -> String {
        self.interpreter
            .as_ref()
            .map(|i| i.output())
            .unwrap_or_default()
    }

    /// Non-mutating view of the current state for visualization.
    pub fn memory_snapshot(&self) -> Option<MemorySnapshot> {
        self.interpreter.as_ref().map(|i| i.memory_snapshot())
    }

    pub fn interpreter(&self) -> Option<&Interpreter> {
        self.interpreter.as_ref()
    }
}
