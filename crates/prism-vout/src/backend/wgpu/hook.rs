//! Parser for mpv-style user shaders (`//!HOOK` blocks).
//!
//! A shader file is a sequence of blocks. Each block starts with a run of
//! `//!` directive lines followed by its body. Blocks with a `//!TEXTURE`
//! directive embed texture data, `//!PARAM` blocks declare tunables, and every
//! other block is a hook pass.

use anyhow::{Context, Result, bail, ensure};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HookPass {
    pub description: Option<String>,
    /// Stages the pass is attached to (`MAIN`, `LUMA`, ...).
    pub hooks: Vec<String>,
    pub binds: Vec<String>,
    pub save: Option<String>,
    pub width: Option<String>,
    pub height: Option<String>,
    pub when: Option<String>,
    pub components: Option<u8>,
    pub compute: Option<String>,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HookTexture {
    pub name: String,
    pub size: Vec<u32>,
    pub format: Option<String>,
    /// Hex encoded texel data.
    pub data: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HookParam {
    pub name: String,
    pub kind: Option<String>,
    pub default: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserShader {
    pub passes: Vec<HookPass>,
    pub textures: Vec<HookTexture>,
    pub params: Vec<HookParam>,
}

struct Block<'a> {
    directives: Vec<(&'a str, &'a str)>,
    body: String,
    line: usize,
}

impl UserShader {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data).context("shader is not UTF-8 text")?;
        let mut shader = Self::default();

        for block in split_blocks(text) {
            let is = |d: &str| block.directives.iter().any(|(k, _)| *k == d);
            if is("TEXTURE") {
                shader.textures.push(parse_texture(&block)?);
            } else if is("PARAM") {
                shader.params.push(parse_param(&block)?);
            } else {
                shader.passes.push(parse_pass(&block)?);
            }
        }

        ensure!(!shader.passes.is_empty(), "shader contains no hook passes");
        Ok(shader)
    }
}

fn split_blocks(text: &str) -> Vec<Block<'_>> {
    let mut blocks: Vec<Block<'_>> = Vec::new();
    let mut in_header = false;

    for (n, line) in text.lines().enumerate() {
        if let Some(directive) = line.trim_start().strip_prefix("//!") {
            let (key, value) = directive
                .split_once(char::is_whitespace)
                .map_or((directive.trim(), ""), |(k, v)| (k, v.trim()));
            if !in_header {
                blocks.push(Block {
                    directives: Vec::new(),
                    body: String::new(),
                    line: n + 1,
                });
                in_header = true;
            }
            if let Some(block) = blocks.last_mut() {
                block.directives.push((key, value));
            }
            continue;
        }

        in_header = false;
        // Text before the first directive is a file comment.
        if let Some(block) = blocks.last_mut() {
            block.body.push_str(line);
            block.body.push('\n');
        }
    }

    blocks
}

fn parse_pass(block: &Block<'_>) -> Result<HookPass> {
    let mut pass = HookPass {
        body: block.body.clone(),
        ..HookPass::default()
    };

    for &(key, value) in &block.directives {
        match key {
            "HOOK" => pass.hooks.push(value.to_owned()),
            "BIND" => pass.binds.push(value.to_owned()),
            "DESC" => pass.description = Some(value.to_owned()),
            "SAVE" => pass.save = Some(value.to_owned()),
            "WIDTH" => pass.width = Some(value.to_owned()),
            "HEIGHT" => pass.height = Some(value.to_owned()),
            "WHEN" => pass.when = Some(value.to_owned()),
            "COMPUTE" => pass.compute = Some(value.to_owned()),
            "COMPONENTS" => {
                let n: u8 = value
                    .parse()
                    .with_context(|| format!("line {}: invalid COMPONENTS", block.line))?;
                ensure!((1..=4).contains(&n), "line {}: COMPONENTS out of range", block.line);
                pass.components = Some(n);
            }
            "OFFSET" => {}
            other => log::debug!("line {}: ignoring shader directive {other}", block.line),
        }
    }

    if pass.hooks.is_empty() {
        bail!("line {}: pass without //!HOOK", block.line);
    }
    ensure!(
        pass.body.contains("hook"),
        "line {}: pass body defines no hook() function",
        block.line
    );
    Ok(pass)
}

fn parse_texture(block: &Block<'_>) -> Result<HookTexture> {
    let mut name = None;
    let mut size = Vec::new();
    let mut format = None;

    for &(key, value) in &block.directives {
        match key {
            "TEXTURE" => name = Some(value.to_owned()),
            "SIZE" => {
                size = value
                    .split_whitespace()
                    .map(str::parse)
                    .collect::<Result<_, _>>()
                    .with_context(|| format!("line {}: invalid SIZE", block.line))?;
            }
            "FORMAT" => format = Some(value.to_owned()),
            _ => {}
        }
    }

    ensure!(
        (1..=3).contains(&size.len()),
        "line {}: texture needs a SIZE of 1 to 3 dimensions",
        block.line
    );
    let data: String = block.body.split_whitespace().collect();
    ensure!(
        data.len() % 2 == 0 && data.bytes().all(|b| b.is_ascii_hexdigit()),
        "line {}: texture data is not hex",
        block.line
    );

    Ok(HookTexture {
        name: name
            .filter(|n| !n.is_empty())
            .with_context(|| format!("line {}: texture without a name", block.line))?,
        size,
        format,
        data,
    })
}

fn parse_param(block: &Block<'_>) -> Result<HookParam> {
    let mut name = None;
    let mut kind = None;
    for &(key, value) in &block.directives {
        match key {
            "PARAM" => name = Some(value.to_owned()),
            "TYPE" => kind = Some(value.to_owned()),
            _ => {}
        }
    }

    Ok(HookParam {
        name: name
            .filter(|n| !n.is_empty())
            .with_context(|| format!("line {}: parameter without a name", block.line))?,
        kind,
        default: block.body.trim().to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHARPEN: &str = "\
// Simple sharpen
//!HOOK LUMA
//!BIND HOOKED
//!DESC sharpen
vec4 hook() {
    return HOOKED_tex(HOOKED_pos);
}

//!PARAM strength
//!TYPE float
0.5

//!TEXTURE noise
//!SIZE 2 2
//!FORMAT r8
00ff
ff00
";

    #[test]
    fn parses_passes_params_and_textures() {
        let shader = UserShader::parse(SHARPEN.as_bytes()).unwrap();
        assert_eq!(shader.passes.len(), 1);
        let pass = &shader.passes[0];
        assert_eq!(pass.hooks, vec!["LUMA"]);
        assert_eq!(pass.binds, vec!["HOOKED"]);
        assert_eq!(pass.description.as_deref(), Some("sharpen"));
        assert!(pass.body.contains("vec4 hook()"));

        assert_eq!(shader.params[0].name, "strength");
        assert_eq!(shader.params[0].default, "0.5");

        let tex = &shader.textures[0];
        assert_eq!(tex.name, "noise");
        assert_eq!(tex.size, vec![2, 2]);
        assert_eq!(tex.data, "00ffff00");
    }

    #[test]
    fn pass_without_hook_is_rejected() {
        let text = "//!DESC lonely\nvec4 hook() { return vec4(0.0); }\n";
        assert!(UserShader::parse(text.as_bytes()).is_err());
    }

    #[test]
    fn empty_shader_is_rejected() {
        assert!(UserShader::parse(b"// nothing here\n").is_err());
    }

    #[test]
    fn consecutive_passes_split() {
        let text = "\
//!HOOK MAIN
//!COMPONENTS 3
vec4 hook() { return HOOKED_tex(HOOKED_pos); }
//!HOOK CHROMA
//!SAVE BLURRED
vec4 hook() { return HOOKED_tex(HOOKED_pos); }
";
        let shader = UserShader::parse(text.as_bytes()).unwrap();
        assert_eq!(shader.passes.len(), 2);
        assert_eq!(shader.passes[0].components, Some(3));
        assert_eq!(shader.passes[1].save.as_deref(), Some("BLURRED"));
    }
}
