//! Loads required modules by running them in a `lua` interpreter.
//!
//! A probe chunk snapshots `_G`, calls `require`, and prints one record per
//! line:
//!
//! - `G <name> <0|1>`: a global that appeared, `1` when it holds the module
//! - `F <path> <type>`: an exported field (nested tables as dotted paths)
//! - `V <type>`: the module is not a table
//! - `E <message>`: `require` raised an error
//!
//! Fields are tab separated.

use globcheck_analysis::{LoadError, LoadedModule, ModuleLoader, NewGlobal};
use globcheck_core::{Kind, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Command;
use tracing::{debug, trace};

const ENV_MODULE: &str = "GLOBCHECK_MODULE";
const MAX_DEPTH: usize = 3;

const PROBE: &str = r#"
local name = os.getenv("GLOBCHECK_MODULE")
local before = {}
for k in pairs(_G) do before[k] = true end
local ok, result = pcall(require, name)
if not ok then
  io.write("E\t", (string.gsub(tostring(result), "%s+", " ")), "\n")
  return
end
for k, v in pairs(_G) do
  if type(k) == "string" and not before[k] then
    io.write("G\t", k, "\t", rawequal(v, result) and "1" or "0", "\n")
  end
end
local seen = {}
local function dump(prefix, t, depth)
  seen[t] = true
  for k, v in pairs(t) do
    if type(k) == "string" then
      local path = prefix .. k
      io.write("F\t", path, "\t", type(v), "\n")
      if type(v) == "table" and depth > 1 and not seen[v] then
        dump(path .. ".", v, depth - 1)
      end
    end
  end
end
if type(result) == "table" then
  dump("", result, tonumber(os.getenv("GLOBCHECK_DEPTH")) or 1)
else
  io.write("V\t", type(result), "\n")
end
"#;

/// Module loader backed by the `lua` interpreter. Results, failures
/// included, are cached for the whole run.
pub struct LuaProcessLoader {
    lua: PathBuf,
    cache: HashMap<String, Result<LoadedModule, LoadError>>,
}

impl LuaProcessLoader {
    pub fn new(lua: impl Into<PathBuf>) -> Self {
        LuaProcessLoader {
            lua: lua.into(),
            cache: HashMap::new(),
        }
    }

    fn run_probe(&self, module: &str) -> Result<LoadedModule, LoadError> {
        debug!(module, lua = %self.lua.display(), "loading module");
        let output = Command::new(&self.lua)
            .arg("-e")
            .arg(PROBE)
            .env(ENV_MODULE, module)
            .env("GLOBCHECK_DEPTH", MAX_DEPTH.to_string())
            .output()
            .map_err(|err| LoadError::Failed {
                module: module.to_string(),
                reason: format!("cannot run {}: {err}", self.lua.display()),
            })?;
        if !output.status.success() {
            return Err(LoadError::Failed {
                module: module.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        parse_probe_output(module, &String::from_utf8_lossy(&output.stdout))
    }
}

impl ModuleLoader for LuaProcessLoader {
    fn load(&mut self, module: &str) -> Result<LoadedModule, LoadError> {
        if let Some(cached) = self.cache.get(module) {
            trace!(module, "module cache hit");
            return cached.clone();
        }
        let loaded = self.run_probe(module);
        self.cache.insert(module.to_string(), loaded.clone());
        loaded
    }
}

fn kind_value(type_name: &str) -> Value {
    match type_name {
        "table" => Value::table(),
        other => Value::Scalar(Kind::from_type_name(other).unwrap_or(Kind::Any)),
    }
}

fn parse_probe_output(module: &str, text: &str) -> Result<LoadedModule, LoadError> {
    let mut loaded = LoadedModule::new(Value::table());
    for line in text.lines() {
        let mut fields = line.split('\t');
        match (fields.next(), fields.next(), fields.next()) {
            (Some("E"), Some(message), _) => {
                let not_found = format!("module '{module}' not found");
                return Err(if message.contains(&not_found) {
                    LoadError::NotFound {
                        module: module.to_string(),
                    }
                } else {
                    LoadError::Failed {
                        module: module.to_string(),
                        reason: message.trim().to_string(),
                    }
                });
            }
            (Some("G"), Some(name), Some(flag)) => loaded.new_globals.push(NewGlobal {
                name: name.to_string(),
                is_module_value: flag == "1",
            }),
            (Some("F"), Some(path), Some(type_name)) => {
                // Parents are printed before their fields.
                if let Some(table) = loaded.exports.as_table_mut() {
                    table.insert_path(path, kind_value(type_name));
                }
            }
            (Some("V"), Some(type_name), _) => loaded.exports = kind_value(type_name),
            _ => trace!(module, line, "ignored probe output"),
        }
    }
    Ok(loaded)
}
