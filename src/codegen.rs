/// C source emission.
///
/// The generated program represents every value as a 64-bit `Value`:
/// integers (and unboxed zero-arity constructors) are tagged `v << 1 | 1`,
/// heap pointers are even. A heap cell is a `Value` array with the header
/// `[Tag, Size, Refs]` at indices 0-2 and data fields from index 3 - the
/// same protocol the interpreter models. Runtime helpers `inc`, `dec` and
/// `drop_reuse` carry the refcount discipline; fip reuse sites mutate a
/// claimed cell in place instead of allocating.
use crate::ast::BinOp;
use crate::lower::{Def, Operand, Stmt};

pub struct Codegen {
    lines: Vec<String>,
}

impl Codegen {
    pub fn new() -> Self {
        Codegen { lines: Vec::new() }
    }

    pub fn emit(mut self, defs: &[Def]) -> String {
        self.preamble(defs);
        for def in defs {
            self.function(def);
        }
        self.lines.join("\n")
    }

    fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    fn preamble(&mut self, defs: &[Def]) {
        self.push("#include <stdio.h>");
        self.push("#include <stdlib.h>");
        self.push("");
        self.push("typedef long long Value;");
        self.push("");
        for def in defs {
            self.push(format!("Value {}({});", def.id, params(def)));
        }
        self.push("");
        self.push("Value inc(Value ref) {");
        self.push("\tif (!(1 & ref)) {");
        self.push("\t\tValue* ptr = (Value*) ref;");
        self.push("\t\tptr[2]++;");
        self.push("\t}");
        self.push("\treturn ref;");
        self.push("}");
        self.push("");
        self.push("Value dec(Value ref) {");
        self.push("\tif (!(1 & ref)) {");
        self.push("\t\tValue* ptr = (Value*) ref;");
        self.push("\t\tif (ptr[2] == 1) {");
        self.push("\t\t\tfor (int i = 3; i < ptr[1] + 3; i++) {");
        self.push("\t\t\t\tdec(ptr[i]);");
        self.push("\t\t\t}");
        self.push("\t\t\tfree(ptr);");
        self.push("\t\t} else {");
        self.push("\t\t\tptr[2]--;");
        self.push("\t\t}");
        self.push("\t}");
        self.push("\treturn ref;");
        self.push("}");
        self.push("");
        self.push("Value drop_reuse(Value ref) {");
        self.push("\tValue* ptr = (Value*) ref;");
        self.push("\tif (ptr[2] == 1) {");
        self.push("\t\tfor (int i = 3; i < ptr[1] + 3; i++) {");
        self.push("\t\t\tdec(ptr[i]);");
        self.push("\t\t}");
        self.push("\t\treturn ref;");
        self.push("\t}");
        self.push("\tptr[2]--;");
        self.push("\treturn 0;");
        self.push("}");
        self.push("");
    }

    fn function(&mut self, def: &Def) {
        self.push(format!("Value {}({}) {{", def.id, params(def)));
        for stmt in &def.body {
            self.statement(stmt, 1);
        }
        self.push("}");
        self.push("");
    }

    fn statement(&mut self, stmt: &Stmt, depth: usize) {
        let tab = "\t".repeat(depth);
        match stmt {
            Stmt::Assign(id, op) => self.push(format!("{}Value {} = {};", tab, sanitize(id), operand(op))),
            Stmt::AllocCell(id, size) => self.push(format!(
                "{}Value {} = (Value) malloc({} * sizeof(Value));",
                tab,
                sanitize(id),
                size + 3
            )),
            Stmt::SetField(id, index, op) => self.push(format!(
                "{}((Value*) {})[{}] = {};",
                tab,
                sanitize(id),
                index,
                operand(op)
            )),
            Stmt::GetField(id, index, op) => self.push(format!(
                "{}Value {} = ((Value*) {})[{}];",
                tab,
                sanitize(id),
                operand(op),
                index
            )),
            Stmt::BinOp(id, op, lhs, rhs) => {
                let l = format!("({} >> 1)", operand(lhs));
                let r = format!("({} >> 1)", operand(rhs));
                self.push(format!(
                    "{}Value {} = (({} {} {}) << 1) | 1;",
                    tab,
                    sanitize(id),
                    l,
                    op.symbol(),
                    r
                ));
            }
            Stmt::TagCheck(id, heap_check, op, tag) => {
                let value = operand(op);
                let tagged = (tag << 1) | 1;
                if *heap_check {
                    self.push(format!(
                        "{}Value {} = !(1 & {}) && ((Value*) {})[0] == {};",
                        tab, sanitize(id), value, value, tagged
                    ));
                } else {
                    self.push(format!("{}Value {} = {} == {};", tab, sanitize(id), value, tagged));
                }
            }
            Stmt::CallAssign(id, fid, args) => {
                let args = args.iter().map(operand).collect::<Vec<_>>().join(", ");
                self.push(format!("{}Value {} = {}({});", tab, sanitize(id), fid, args));
            }
            Stmt::DropReuse(id, src) => {
                self.push(format!("{}Value {} = drop_reuse({});", tab, sanitize(id), sanitize(src)))
            }
            Stmt::IfElse(branches) => {
                for (i, (cond, stmts)) in branches.iter().enumerate() {
                    if i == 0 {
                        self.push(format!("{}if ({}) {{", tab, operand(cond)));
                    } else if i == branches.len() - 1 && matches!(cond, Operand::Raw(1)) {
                        self.push(format!("{}else {{", tab));
                    } else {
                        self.push(format!("{}else if ({}) {{", tab, operand(cond)));
                    }
                    for stmt in stmts {
                        self.statement(stmt, depth + 1);
                    }
                    self.push(format!("{}}}", tab));
                }
            }
            Stmt::Return(op) => self.push(format!("{}return {};", tab, operand(op))),
            Stmt::Print(op) => self.push(format!(
                "{}printf(\"%lld\\n\", {} >> 1);",
                tab,
                operand(op)
            )),
            Stmt::Inc(id) => self.push(format!("{}inc({});", tab, sanitize(id))),
            Stmt::Dec(id) => self.push(format!("{}dec({});", tab, sanitize(id))),
        }
    }
}

fn params(def: &Def) -> String {
    def.args
        .iter()
        .map(|arg| format!("Value {}", sanitize(arg)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn operand(op: &Operand) -> String {
    match op {
        Operand::Var(name) => sanitize(name),
        Operand::Int(i) => ((i << 1) | 1).to_string(),
        Operand::Raw(i) => i.to_string(),
        Operand::Not(name) => format!("!{}", sanitize(name)),
    }
}

/// Uniqued names carry an `@`; C identifiers cannot.
fn sanitize(name: &str) -> String {
    name.replace('@', "_")
}
