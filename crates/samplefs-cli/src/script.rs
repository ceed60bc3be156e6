// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Line-oriented scripts executed against one mounted namespace
//!
//! Each non-empty line is `COMMAND ARGS...`; `#` starts a comment line. A
//! leading `!` marks a command that must fail: its error is printed as
//! `ERR <message> (errno=<n>)` and the script continues.

use anyhow::{Context, Result, anyhow, bail};
use samplefs_core::{
    BLOCK_SIZE, Credentials, FsError, Namespace, NodeId, Resolution, S_IFBLK, S_IFCHR, S_IFIFO,
    S_IFREG, S_IFSOCK, SetAttr,
};
use std::io::Write;
use tracing::debug;

pub struct Session<W: Write> {
    ns: Namespace,
    caller: Credentials,
    out: W,
}

impl<W: Write> Session<W> {
    pub fn new(ns: Namespace, caller: Credentials, out: W) -> Self {
        Self { ns, caller, out }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.ns
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Run every line of `script`, stopping at the first unexpected failure
    pub fn run_script(&mut self, script: &str) -> Result<()> {
        for (idx, raw) in script.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            self.run_line(line).with_context(|| format!("line {}: {}", idx + 1, line))?;
        }
        Ok(())
    }

    fn run_line(&mut self, line: &str) -> Result<()> {
        let Some(expected) = line.strip_prefix('!') else {
            return self.execute(line);
        };
        match self.execute(expected.trim_start()) {
            Ok(()) => bail!("expected failure but command succeeded"),
            Err(err) => {
                let errno = err.downcast_ref::<FsError>().map(FsError::errno).unwrap_or(0);
                writeln!(self.out, "ERR {} (errno={})", err, errno)?;
                Ok(())
            }
        }
    }

    /// Execute a single command
    pub fn execute(&mut self, line: &str) -> Result<()> {
        let (command, rest) = split_word(line);
        let args: Vec<&str> = rest.split_whitespace().collect();
        debug!(target: "samplefs_cli", "executing {} {:?}", command, args);

        match command {
            "mkdir" => {
                let (path, mode) = path_and_mode(&args, 0o755)?;
                let (parent, name) = self.parent_and_name(path)?;
                self.ns.mkdir(parent, name, mode, self.caller)?;
            }
            "touch" => {
                let (path, mode) = path_and_mode(&args, 0o644)?;
                let (parent, name) = self.parent_and_name(path)?;
                self.ns.create(parent, name, mode, self.caller)?;
            }
            "mknod" => {
                let [path, kind, extra @ ..] = args.as_slice() else {
                    bail!("usage: mknod PATH fifo|sock|chr|blk|file [MODE] [RDEV]");
                };
                let type_bits = match *kind {
                    "fifo" => S_IFIFO,
                    "sock" => S_IFSOCK,
                    "chr" => S_IFCHR,
                    "blk" => S_IFBLK,
                    "file" => S_IFREG,
                    other => bail!("unknown node kind {}", other),
                };
                let mode = extra.first().map(|m| parse_mode(m)).transpose()?.unwrap_or(0o644);
                let rdev = extra
                    .get(1)
                    .map(|r| r.parse::<u64>().with_context(|| format!("invalid device id {}", r)))
                    .transpose()?
                    .unwrap_or(0);
                let (parent, name) = self.parent_and_name(path)?;
                self.ns.mknod(parent, name, type_bits | mode, rdev, self.caller)?;
            }
            "symlink" => {
                let [target, path] = args.as_slice() else {
                    bail!("usage: symlink TARGET PATH");
                };
                let (parent, name) = self.parent_and_name(path)?;
                self.ns.symlink(parent, name, target.as_bytes(), self.caller)?;
            }
            "link" => {
                let [existing, path] = args.as_slice() else {
                    bail!("usage: link EXISTING NEW");
                };
                let node = self.ns.lookup_path(existing)?;
                let (parent, name) = self.parent_and_name(path)?;
                self.ns.link(node, parent, name)?;
            }
            "rm" => {
                let (parent, name) = self.parent_and_name(single(&args, "rm PATH")?)?;
                self.ns.unlink(parent, name)?;
            }
            "rmdir" => {
                let (parent, name) = self.parent_and_name(single(&args, "rmdir PATH")?)?;
                self.ns.rmdir(parent, name)?;
            }
            "mv" => {
                let [from, to] = args.as_slice() else {
                    bail!("usage: mv OLD NEW");
                };
                let (old_parent, old_name) = self.parent_and_name(from)?;
                let (new_parent, new_name) = self.parent_and_name(to)?;
                self.ns.rename(old_parent, old_name, new_parent, new_name)?;
            }
            "ls" => {
                let dir = self.ns.lookup_path(args.first().copied().unwrap_or("/"))?;
                for entry in self.ns.readdir(dir)? {
                    writeln!(self.out, "{}\t{}\t{}", entry.name_lossy(), entry.node_type, entry.id)?;
                }
            }
            "stat" => {
                let node = self.ns.lookup_path(single(&args, "stat PATH")?)?;
                let attrs = self.ns.getattr(node)?;
                writeln!(
                    self.out,
                    "{}\t{}\tmode={:04o}\tuid={}\tgid={}\tnlink={}\tsize={}",
                    attrs.id,
                    attrs.node_type,
                    attrs.permissions(),
                    attrs.uid,
                    attrs.gid,
                    attrs.nlink,
                    attrs.size
                )?;
            }
            "lookup" => {
                let (parent, name) = self.parent_and_name(single(&args, "lookup PATH")?)?;
                let resolution = self.ns.resolve(parent, name)?;
                let retention = self.ns.retention(&resolution)?;
                match resolution {
                    Resolution::Found(id) => {
                        writeln!(self.out, "found {}\tretain={:?}", id, retention)?
                    }
                    Resolution::NotFound => writeln!(self.out, "not found\tretain={:?}", retention)?,
                }
            }
            "readlink" => {
                let node = self.ns.lookup_path(single(&args, "readlink PATH")?)?;
                let target = self.ns.readlink(node)?;
                writeln!(self.out, "{}", String::from_utf8_lossy(&target))?;
            }
            "write" => {
                let (path, text) = split_word(rest.trim_start());
                if path.is_empty() {
                    bail!("usage: write PATH TEXT");
                }
                let node = self.ns.lookup_path(path)?;
                self.append(node, text.as_bytes())?;
            }
            "truncate" => {
                let [path, len] = args.as_slice() else {
                    bail!("usage: truncate PATH LEN");
                };
                let len = len.parse::<u64>().with_context(|| format!("invalid length {}", len))?;
                let node = self.ns.lookup_path(path)?;
                self.ns.truncate(node, len)?;
            }
            "cat" => {
                let node = self.ns.lookup_path(single(&args, "cat PATH")?)?;
                let contents = self.read_all(node)?;
                self.out.write_all(&contents)?;
                writeln!(self.out)?;
            }
            "chmod" => {
                let [mode, path] = args.as_slice() else {
                    bail!("usage: chmod MODE PATH");
                };
                let changes = SetAttr {
                    mode: Some(parse_mode(mode)?),
                    ..Default::default()
                };
                let node = self.ns.lookup_path(path)?;
                self.ns.setattr(node, &changes)?;
            }
            "statfs" => {
                let st = self.ns.statfs()?;
                writeln!(
                    self.out,
                    "magic=0x{:08x}\tbsize={}\tnamemax={}\tfiles={}",
                    st.magic, st.block_size, st.name_max, st.files
                )?;
            }
            "debug" => {
                let info = self.ns.debug_info()?;
                writeln!(self.out, "{}", info)?;
            }
            "unmount" => self.ns.unmount(),
            other => bail!("unknown command {}", other),
        }
        Ok(())
    }

    fn parent_and_name<'a>(&self, path: &'a str) -> Result<(NodeId, &'a [u8])> {
        let (dir, name) = split_parent(path)?;
        let parent = self.ns.lookup_path(dir)?;
        Ok((parent, name.as_bytes()))
    }

    /// Append in chunks of the mount's write size
    fn append(&mut self, node: NodeId, data: &[u8]) -> Result<()> {
        let chunk = self.ns.config()?.wsize().unwrap_or(BLOCK_SIZE) as usize;
        let mut offset = self.ns.getattr(node)?.size;
        for piece in data.chunks(chunk) {
            let written = self.ns.write(node, offset, piece)?;
            offset += written as u64;
        }
        Ok(())
    }

    fn read_all(&mut self, node: NodeId) -> Result<Vec<u8>> {
        let chunk = self.ns.config()?.rsize().unwrap_or(BLOCK_SIZE) as usize;
        let mut buf = vec![0u8; chunk];
        let mut contents = Vec::new();
        let mut offset = 0u64;
        loop {
            let n = self.ns.read(node, offset, &mut buf)?;
            if n == 0 {
                break;
            }
            contents.extend_from_slice(&buf[..n]);
            offset += n as u64;
        }
        Ok(contents)
    }
}

fn split_word(line: &str) -> (&str, &str) {
    match line.find(char::is_whitespace) {
        Some(pos) => (&line[..pos], line[pos..].trim_start()),
        None => (line, ""),
    }
}

/// Split `/a/b/c` into `/a/b` and `c`
fn split_parent(path: &str) -> Result<(&str, &str)> {
    let trimmed = path.trim_end_matches('/');
    let (dir, name) = match trimmed.rfind('/') {
        Some(0) => ("/", &trimmed[1..]),
        Some(pos) => (&trimmed[..pos], &trimmed[pos + 1..]),
        None => ("/", trimmed),
    };
    if name.is_empty() {
        return Err(anyhow!("{} has no final component", path));
    }
    Ok((dir, name))
}

fn parse_mode(mode: &str) -> Result<u32> {
    u32::from_str_radix(mode, 8).with_context(|| format!("invalid octal mode {}", mode))
}

fn path_and_mode<'a>(args: &[&'a str], default_mode: u32) -> Result<(&'a str, u32)> {
    match args {
        [path] => Ok((path, default_mode)),
        [path, mode] => Ok((path, parse_mode(mode)?)),
        _ => bail!("expected PATH [MODE]"),
    }
}

fn single<'a>(args: &[&'a str], usage: &str) -> Result<&'a str> {
    match args {
        [arg] => Ok(arg),
        _ => bail!("usage: {}", usage),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use samplefs_core::MountParams;

    fn run(options: &str, script: &str) -> Result<String> {
        let ns = Namespace::mount(options, MountParams::default()).expect("mount");
        let mut session = Session::new(ns, Credentials::new(1000, 1000), Vec::new());
        session.run_script(script)?;
        Ok(String::from_utf8(session.into_output()).expect("utf8 output"))
    }

    #[test]
    fn test_split_parent() {
        assert_eq!(split_parent("/a/b/c").unwrap(), ("/a/b", "c"));
        assert_eq!(split_parent("/a").unwrap(), ("/", "a"));
        assert_eq!(split_parent("a").unwrap(), ("/", "a"));
        assert_eq!(split_parent("/a/b/").unwrap(), ("/a", "b"));
        assert!(split_parent("/").is_err());
    }

    #[test]
    fn test_write_and_cat_in_small_chunks() {
        let output = run(
            "rsize=3,wsize=2",
            "mkdir /docs\n\
             touch /docs/notes\n\
             write /docs/notes hello world\n\
             cat /docs/notes\n",
        )
        .expect("script");
        assert_eq!(output, "hello world\n");
    }

    #[test]
    fn test_expected_failures_are_reported() {
        let output = run(
            "",
            "mkdir /a\n\
             ! mkdir /a\n\
             ! rmdir /missing\n",
        )
        .expect("script");
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("ERR already exists"));
        assert!(lines[1].starts_with("ERR not found"));
    }

    #[test]
    fn test_unexpected_success_fails_the_script() {
        let err = run("", "! mkdir /a\n").expect_err("should fail");
        assert!(format!("{:#}", err).contains("line 1"));
    }

    #[test]
    fn test_failure_reports_line_number() {
        let err = run("", "# comment\n\nrmdir /nope\n").expect_err("should fail");
        let message = format!("{:#}", err);
        assert!(message.contains("line 3: rmdir /nope"));
        assert!(message.contains("not found"));
    }

    #[test]
    fn test_case_insensitive_lookup_and_retention() {
        let output = run(
            "nocase",
            "mkdir /Docs\n\
             lookup /DOCS\n\
             lookup /other\n\
             ! mkdir /docs\n",
        )
        .expect("script");
        let lines: Vec<&str> = output.lines().collect();
        assert!(lines[0].starts_with("found #"));
        assert_eq!(lines[1], "not found\tretain=0ns");
        assert!(lines[2].starts_with("ERR already exists"));
    }

    #[test]
    fn test_listing_keeps_creation_order() {
        let output = run(
            "",
            "touch /zeta\n\
             mkdir /alpha\n\
             symlink /zeta /link\n\
             mknod /pipe fifo\n\
             ls /\n",
        )
        .expect("script");
        let names: Vec<&str> = output.lines().map(|l| l.split('\t').next().unwrap()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "link", "pipe"]);
        assert!(output.contains("pipe\tspecial"));
    }

    #[test]
    fn test_stat_link_and_rename() {
        let output = run(
            "",
            "mkdir /a 700\n\
             mkdir /b\n\
             touch /a/f\n\
             link /a/f /b/g\n\
             stat /b/g\n\
             mv /a/f /b/h\n\
             stat /a\n\
             ls /b\n",
        )
        .expect("script");
        let lines: Vec<&str> = output.lines().collect();
        assert!(lines[0].contains("\tfile\tmode=0644\tuid=1000\tgid=1000\tnlink=2\t"));
        assert!(lines[1].contains("\tdirectory\tmode=0700\t"));
        assert!(lines[1].contains("nlink=2"));
        assert!(lines[2].starts_with("g\t"));
        assert!(lines[3].starts_with("h\t"));
    }

    #[test]
    fn test_statfs_and_debug_report() {
        let output = run("", "mkdir /d\nstatfs\ndebug\n").expect("script");
        assert!(output.starts_with("magic=0x73616d70\tbsize=4096\tnamemax=255\tfiles=2\n"));
        assert!(output.contains("Display Debugging Information"));
    }

    #[test]
    fn test_commands_after_unmount_fail() {
        let output = run("", "unmount\n! ls /\n").expect("script");
        assert!(output.starts_with("ERR namespace is not mounted"));
    }

    #[test]
    fn test_unknown_command() {
        let err = run("", "frobnicate /x\n").expect_err("should fail");
        assert!(format!("{:#}", err).contains("unknown command frobnicate"));
    }
}
