//! Class tables.
//!
//! A `classLike` function declaration is the class constructor. It renders as
//! a method table that is its own `__index`, a `new` allocator, and the
//! constructor body as `constructor`:
//!
//! ```lua
//! local Point = {}
//! Point.__index = Point
//! setmetatable(Point, { __index = Base })
//! function Point.new(...)
//!   local self = setmetatable({}, Point)
//!   Point.constructor(self, ...)
//!   return self
//! end
//! function Point.constructor(self, x)
//!   ...
//! end
//! ```
//!
//! Methods follow as ordinary assignments onto the table.

use super::{EmitError, Emitter};
use lunate_ir::NodeId;

impl Emitter<'_> {
    pub(super) fn class_declaration(
        &self,
        name: &NodeId,
        params: &[NodeId],
        vararg: bool,
        body: &NodeId,
        super_class: Option<&NodeId>,
        depth: usize,
    ) -> Result<String, EmitError> {
        let pad = self.indent(depth);
        let inner = self.indent(depth + 1);
        let name = self.identifier_name(name)?;
        let local = if self.global_scope(depth) { "" } else { "local " };

        let mut lines = vec![
            format!("{}{}{} = {{}}", pad, local, name),
            format!("{}{}.__index = {}", pad, name, name),
        ];
        if let Some(base) = super_class {
            let base = self.expression(base, depth)?;
            lines.push(format!(
                "{}setmetatable({}, {{ __index = {} }})",
                pad, name, base.text
            ));
        }

        lines.push(format!("{}function {}.new(...)", pad, name));
        lines.push(format!("{}local self = setmetatable({{}}, {})", inner, name));
        lines.push(format!("{}{}.constructor(self, ...)", inner, name));
        lines.push(format!("{}return self", inner));
        lines.push(format!("{}end", pad));

        let head = format!("{}function {}.constructor", pad, name);
        lines.push(self.function_text(&head, params, vararg, body, depth)?);
        Ok(lines.join("\n"))
    }
}
