//! The METAL macro linker.
//!
//! A second pass over the compiled instruction vector that replaces the
//! body of every `metal:use-macro` element with a copy of the referenced
//! macro body, substituting filled slots. Because all control flow is
//! expressed as indices into the flat vector, a splice has to rebase the
//! index fields of the copied instructions (through a piecewise chunk map)
//! and shift the index fields of everything after the splice point.
//!
//! Sites are expanded in document order, so a macro whose body uses another
//! macro is fully expanded before anyone copies it.

use std::collections::BTreeMap;
use std::ops::Range;

use crate::error::{CompileError, CompileErrorKind};
use crate::types::program::{Instr, MacroDef};
use crate::types::span::Span;

/// A `metal:use-macro` element recorded by the compiler.
pub(crate) struct UseSite {
    pub name: String,
    pub span: Span,
    /// The instruction span between the element's start and end tags.
    pub body: Range<usize>,
    /// Fill spans by slot name, all within `body`.
    pub fills: BTreeMap<String, Range<usize>>,
}

/// A contiguous run of copied instructions: `orig` in working coordinates,
/// placed at `new_start`.
struct Chunk {
    orig: Range<usize>,
    new_start: usize,
}

pub(crate) fn expand(
    mut instrs: Vec<Instr>,
    mut macros: BTreeMap<String, MacroDef>,
    mut uses: Vec<UseSite>,
    source: &str,
) -> Result<(Vec<Instr>, BTreeMap<String, MacroDef>), CompileError> {
    if uses.is_empty() {
        return Ok((instrs, macros));
    }
    // pop() must yield document order.
    uses.sort_by_key(|site| site.body.start);
    uses.reverse();
    let mut pending = uses;

    while let Some(site) = pending.pop() {
        if site.body.start == usize::MAX {
            // The site was consumed by an earlier, enclosing expansion.
            continue;
        }
        let def = match macros.get(&site.name) {
            Some(def) => def.clone(),
            None => {
                return Err(CompileError::with_span(
                    CompileErrorKind::ExpressionMalformed,
                    format!("use of unknown macro {:?}", site.name),
                    source,
                    site.span,
                ));
            }
        };

        // Build the replacement block: the macro body with each slot span
        // substituted by its fill (or kept as the default content).
        let new_base = site.body.start;
        let mut block: Vec<Instr> = Vec::new();
        let mut chunks: Vec<Chunk> = Vec::new();
        {
            let mut push_chunk = |orig: Range<usize>, block: &mut Vec<Instr>| {
                if orig.is_empty() {
                    return;
                }
                chunks.push(Chunk {
                    orig: orig.clone(),
                    new_start: new_base + block.len(),
                });
                block.extend(instrs[orig].iter().cloned());
            };

            let mut slots: Vec<(&String, &Range<usize>)> = def
                .slots
                .iter()
                .filter(|(_, range)| range.start != usize::MAX)
                .collect();
            slots.sort_by_key(|(_, range)| range.start);

            let mut pos = def.body.start;
            for (slot_name, slot) in slots {
                push_chunk(pos..slot.start, &mut block);
                match site
                    .fills
                    .get(slot_name)
                    .filter(|fill| fill.start != usize::MAX)
                {
                    Some(fill) => push_chunk(fill.clone(), &mut block),
                    None => push_chunk(slot.clone(), &mut block),
                }
                pos = slot.end;
            }
            push_chunk(pos..def.body.end, &mut block);
        }

        // Rebase the index fields of the copied instructions.
        for instr in &mut block {
            instr.for_each_index_mut(|idx| *idx = remap(*idx, &chunks));
        }

        // Shift index fields behind the splice point, splice, and adjust
        // every recorded span.
        let (start, end) = (site.body.start, site.body.end);
        let removed = end - start;
        let added = block.len();
        for (i, instr) in instrs.iter_mut().enumerate() {
            if i < start || i >= end {
                instr.for_each_index_mut(|idx| {
                    if *idx >= end {
                        *idx = *idx - removed + added;
                    }
                });
            }
        }
        instrs.splice(start..end, block);

        let adjust = |range: &mut Range<usize>| {
            if range.start == usize::MAX {
                // Already consumed by an earlier expansion.
            } else if range.start >= end {
                range.start = range.start - removed + added;
                range.end = range.end - removed + added;
            } else if range.start <= start && range.end >= end {
                range.end = range.end - removed + added;
            } else if range.start >= start && range.end <= end {
                // Inside the replaced body: gone.
                *range = usize::MAX..usize::MAX;
            }
        };
        macros.retain(|_, def| {
            adjust(&mut def.body);
            if def.body.start == usize::MAX {
                return false;
            }
            for slot in def.slots.values_mut() {
                adjust(slot);
            }
            true
        });
        for other in &mut pending {
            adjust(&mut other.body);
            for fill in other.fills.values_mut() {
                adjust(fill);
            }
        }
    }

    Ok((instrs, macros))
}

/// Maps a working index through the chunk table of one expansion. Indices on
/// a chunk's one-past-the-end boundary map to the position right after the
/// chunk's copy, which is where the substituted content continues.
fn remap(idx: usize, chunks: &[Chunk]) -> usize {
    for chunk in chunks {
        if idx >= chunk.orig.start && idx < chunk.orig.end {
            return chunk.new_start + (idx - chunk.orig.start);
        }
    }
    for chunk in chunks {
        if idx == chunk.orig.end {
            return chunk.new_start + (chunk.orig.end - chunk.orig.start);
        }
    }
    idx
}
