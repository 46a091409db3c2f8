use std::fmt::{self, Formatter};

use itertools::Itertools;

use crate::pretty::{escape_char, escape_string, pretty, PrettyCtx, PrettyOptions, PrettyPrintable};
use crate::span::Span;
use crate::types::FloatTy;

use super::{
    AggregateKind, AssertMessage, BasicBlockData, BasicBlockId, Body, BodySource, BorrowKind,
    Constant, ConstantKind, LocalId, Operand, Place, PlaceElem, Program, Rvalue, Scalar,
    Statement, StatementKind, Terminator, TerminatorKind, Ty, TyKind,
};

impl PrettyPrintable for Program {
    fn fmt_pretty(&self, f: &mut Formatter<'_>, ctx: &mut PrettyCtx<'_>) -> fmt::Result {
        let mut first = true;
        for item in &self.items {
            let Some(body) = self.bodies.get(&item.body_id()) else {
                continue;
            };
            if !first {
                ctx.blank_line(f)?;
            }
            first = false;
            body.fmt_pretty(f, ctx)?;
        }
        Ok(())
    }
}

impl PrettyPrintable for Body {
    fn fmt_pretty(&self, f: &mut Formatter<'_>, ctx: &mut PrettyCtx<'_>) -> fmt::Result {
        ctx.writeln(f, body_header(self))?;
        ctx.with_indent(|ctx| {
            for info in &self.var_debug_info {
                let place = format_place(&info.place, ctx.options);
                ctx.writeln(f, format!("debug {} => {};", info.name, place))?;
            }
            for (idx, local) in self.locals.iter().enumerate() {
                if idx > 0 && idx <= self.arg_count {
                    continue;
                }
                ctx.writeln(
                    f,
                    format!("let {}_{}: {};", local.mutability.prefix_str(), idx, local.ty),
                )?;
            }
            for (idx, block) in self.basic_blocks.iter().enumerate() {
                ctx.blank_line(f)?;
                write_block(idx as BasicBlockId, block, f, ctx)?;
            }
            Ok(())
        })?;
        ctx.writeln(f, "}")
    }
}

/// Textual dump with default options. Identical bodies print identically.
pub fn body_to_string(body: &Body) -> String {
    pretty(body, PrettyOptions::default()).to_string()
}

pub fn program_to_string(program: &Program) -> String {
    pretty(program, PrettyOptions::default()).to_string()
}

fn body_header(body: &Body) -> String {
    match &body.source {
        BodySource::Fn { path } => {
            let args = body
                .args_iter()
                .map(|local| format!("_{}: {}", local, body.local_decl(local).ty))
                .join(", ");
            format!("fn {}({}) -> {} {{", path, args, body.return_ty())
        }
        BodySource::Const { name } => format!("const {}: {} = {{", name, body.return_ty()),
        BodySource::Static { name, mutability } => format!(
            "static {}{}: {} = {{",
            mutability.prefix_str(),
            name,
            body.return_ty()
        ),
    }
}

fn write_block(
    bb: BasicBlockId,
    block: &BasicBlockData,
    f: &mut Formatter<'_>,
    ctx: &mut PrettyCtx<'_>,
) -> fmt::Result {
    let cleanup = if block.is_cleanup { " (cleanup)" } else { "" };
    ctx.writeln(f, format!("bb{}{}: {{", bb, cleanup))?;
    ctx.with_indent(|ctx| {
        for statement in &block.statements {
            ctx.writeln(f, format_statement(statement, ctx.options))?;
        }
        match &block.terminator {
            Some(terminator) => ctx.writeln(f, format_terminator(terminator, ctx.options)),
            None => ctx.writeln(f, "<unterminated>"),
        }
    })?;
    ctx.writeln(f, "}")
}

fn span_suffix(span: Span, options: &PrettyOptions) -> String {
    if options.show_spans {
        format!(" // {}", span)
    } else {
        String::new()
    }
}

fn format_statement(statement: &Statement, options: &PrettyOptions) -> String {
    let text = match &statement.kind {
        StatementKind::Assign(place, rvalue) => format!(
            "{} = {}",
            format_place(place, options),
            format_rvalue(rvalue, options)
        ),
        StatementKind::StorageLive(local) => format!("StorageLive(_{})", local),
        StatementKind::StorageDead(local) => format!("StorageDead(_{})", local),
        StatementKind::Nop => "nop".to_string(),
    };
    format!("{};{}", text, span_suffix(statement.source_info.span, options))
}

fn format_edges(edges: &[(&str, Option<BasicBlockId>)]) -> String {
    let edges = edges
        .iter()
        .filter_map(|(label, target)| target.map(|bb| format!("{}: bb{}", label, bb)))
        .join(", ");
    if edges.is_empty() {
        String::new()
    } else {
        format!(" -> [{}]", edges)
    }
}

fn format_terminator(terminator: &Terminator, options: &PrettyOptions) -> String {
    let text = match &terminator.kind {
        TerminatorKind::Goto { target } => format!("goto -> bb{}", target),
        TerminatorKind::SwitchInt {
            discr,
            switch_ty,
            targets,
        } => {
            let arms = targets
                .iter()
                .map(|(value, bb)| format!("{}: bb{}", format_switch_value(value, switch_ty), bb))
                .chain(std::iter::once(format!("otherwise: bb{}", targets.otherwise)))
                .join(", ");
            format!("switchInt({}) -> [{}]", format_operand(discr, options), arms)
        }
        TerminatorKind::Resume => "resume".to_string(),
        TerminatorKind::Return => "return".to_string(),
        TerminatorKind::Unreachable => "unreachable".to_string(),
        TerminatorKind::Drop {
            place,
            target,
            unwind,
        } => format!(
            "drop({}){}",
            format_place(place, options),
            format_edges(&[("return", Some(*target)), ("unwind", *unwind)])
        ),
        TerminatorKind::Call {
            func,
            args,
            destination,
            target,
            cleanup,
            ..
        } => {
            let callee = match func.as_constant().map(|constant| &constant.literal) {
                Some(ConstantKind::Fn(name)) => name.to_string(),
                _ => format_operand(func, options),
            };
            format!(
                "{} = {}({}){}",
                format_place(destination, options),
                callee,
                args.iter().map(|arg| format_operand(arg, options)).join(", "),
                format_edges(&[("return", *target), ("unwind", *cleanup)])
            )
        }
        TerminatorKind::Assert {
            cond,
            expected,
            msg,
            target,
            cleanup,
        } => {
            let negate = if *expected { "" } else { "!" };
            let mut parts = vec![
                format!("{}{}", negate, format_operand(cond, options)),
                format!("\"{}\"", escape_string(&msg.description())),
            ];
            parts.extend(msg.operands().into_iter().map(|op| format_operand(op, options)));
            format!(
                "assert({}){}",
                parts.join(", "),
                format_edges(&[("success", Some(*target)), ("unwind", *cleanup)])
            )
        }
    };
    format!("{};{}", text, span_suffix(terminator.source_info.span, options))
}

fn format_switch_value(value: u128, ty: &Ty) -> String {
    match (&ty.kind, ty.scalar_size()) {
        (TyKind::Int(_), Some(size)) => size.sign_extend(value).to_string(),
        _ => value.to_string(),
    }
}

pub fn format_place(place: &Place, options: &PrettyOptions) -> String {
    let mut text = format_local(place.local);
    for elem in &place.projection {
        text = match elem {
            PlaceElem::Deref => format!("(*{})", text),
            PlaceElem::Field(field, ty) if options.show_types => {
                format!("({}.{}: {})", text, field, ty)
            }
            PlaceElem::Field(field, _) => format!("{}.{}", text, field),
            PlaceElem::Index(local) => format!("{}[{}]", text, format_local(*local)),
            PlaceElem::Downcast(name, _) => format!("({} as {})", text, name),
        };
    }
    text
}

fn format_local(local: LocalId) -> String {
    format!("_{}", local)
}

pub fn format_operand(operand: &Operand, options: &PrettyOptions) -> String {
    match operand {
        Operand::Copy(place) => format!("copy {}", format_place(place, options)),
        Operand::Move(place) => format!("move {}", format_place(place, options)),
        Operand::Constant(constant) => format!("const {}", format_constant(constant)),
    }
}

pub fn format_constant(constant: &Constant) -> String {
    match &constant.literal {
        ConstantKind::Scalar(scalar) => format_scalar(*scalar, &constant.ty),
        ConstantKind::ZeroSized => match &constant.ty.kind {
            TyKind::FnDef(name) => name.to_string(),
            _ if constant.ty.is_unit() => "()".to_string(),
            _ => format!("ZeroSized: {}", constant.ty),
        },
        ConstantKind::Str(value) => format!("\"{}\"", escape_string(value)),
        ConstantKind::Fn(name) | ConstantKind::Named(name) => name.to_string(),
    }
}

fn format_scalar(scalar: Scalar, ty: &Ty) -> String {
    let Scalar::Int(int) = scalar;
    let rendered = match &ty.kind {
        TyKind::Bool => scalar.to_bool().ok().map(|value| value.to_string()),
        TyKind::Char => scalar
            .to_char()
            .ok()
            .map(|value| format!("'{}'", escape_char(value))),
        TyKind::Int(int_ty) => Some(format!("{}_{}", int.to_int(), int_ty)),
        TyKind::Uint(uint_ty) => Some(format!("{}_{}", int.to_uint(), uint_ty)),
        TyKind::Float(FloatTy::F32) => scalar.to_f32().ok().map(|value| format!("{:?}_f32", value)),
        TyKind::Float(FloatTy::F64) => scalar.to_f64().ok().map(|value| format!("{:?}_f64", value)),
        _ => None,
    };
    rendered.unwrap_or_else(|| format!("{:?}: {}", int, ty))
}

fn join_operands(ops: &[Operand], options: &PrettyOptions) -> String {
    ops.iter().map(|op| format_operand(op, options)).join(", ")
}

pub fn format_rvalue(rvalue: &Rvalue, options: &PrettyOptions) -> String {
    match rvalue {
        Rvalue::Use(operand) => format_operand(operand, options),
        Rvalue::Repeat(operand, count) => {
            format!("[{}; {}]", format_operand(operand, options), count)
        }
        Rvalue::Ref(BorrowKind::Shared, place) => format!("&{}", format_place(place, options)),
        Rvalue::Ref(BorrowKind::Mut, place) => format!("&mut {}", format_place(place, options)),
        Rvalue::Len(place) => format!("Len({})", format_place(place, options)),
        Rvalue::Cast(kind, operand, ty) => {
            format!("{} as {} ({:?})", format_operand(operand, options), ty, kind)
        }
        Rvalue::BinaryOp(op, lhs, rhs) => format!(
            "{:?}({}, {})",
            op,
            format_operand(lhs, options),
            format_operand(rhs, options)
        ),
        Rvalue::CheckedBinaryOp(op, lhs, rhs) => format!(
            "{:?}WithOverflow({}, {})",
            op,
            format_operand(lhs, options),
            format_operand(rhs, options)
        ),
        Rvalue::UnaryOp(op, operand) => format!("{:?}({})", op, format_operand(operand, options)),
        Rvalue::Discriminant(place) => format!("discriminant({})", format_place(place, options)),
        Rvalue::Aggregate(kind, ops) => match kind.as_ref() {
            AggregateKind::Tuple if ops.len() == 1 => format!("({},)", join_operands(ops, options)),
            AggregateKind::Tuple => format!("({})", join_operands(ops, options)),
            AggregateKind::Array(_) => format!("[{}]", join_operands(ops, options)),
            AggregateKind::Adt(def, variant_idx) => {
                let Some(variant) = def.variant(*variant_idx) else {
                    return format!("{}::<variant {}>({})", def.name, variant_idx, join_operands(ops, options));
                };
                let name = if def.is_enum() {
                    format!("{}::{}", def.name, variant.name)
                } else {
                    def.name.to_string()
                };
                if ops.is_empty() {
                    name
                } else if variant.is_tuple_like() {
                    format!("{}({})", name, join_operands(ops, options))
                } else {
                    let fields = variant
                        .fields
                        .iter()
                        .zip(ops)
                        .map(|(field, op)| format!("{}: {}", field.name, format_operand(op, options)))
                        .join(", ");
                    format!("{} {{ {} }}", name, fields)
                }
            }
        },
    }
}

impl std::fmt::Display for AssertMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let options = PrettyOptions::default();
        let mut text = self.description();
        for operand in self.operands() {
            text = text.replacen("{}", &format_operand(operand, &options), 1);
        }
        write!(f, "{}", text)
    }
}
