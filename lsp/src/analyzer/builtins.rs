//! Reference table for q keywords and the system namespaces.

use once_cell::sync::Lazy;
use tower_lsp::lsp_types::{CompletionItem, CompletionItemKind, Documentation};

use super::symbols::Signature;

#[derive(Debug, Clone)]
pub struct Builtin {
    pub label: &'static str,
    pub detail: &'static str,
    pub documentation: &'static str,
    pub parameters: &'static [&'static str],
}

impl Builtin {
    pub fn is_global(&self) -> bool {
        self.label.starts_with('.')
    }

    pub fn completion_item(&self) -> CompletionItem {
        CompletionItem {
            label: self.label.to_string(),
            kind: Some(if self.parameters.is_empty() {
                CompletionItemKind::KEYWORD
            } else {
                CompletionItemKind::FUNCTION
            }),
            detail: Some(self.detail.to_string()),
            documentation: Some(Documentation::String(self.documentation.to_string())),
            ..Default::default()
        }
    }

    pub fn signature(&self) -> Option<Signature> {
        (!self.parameters.is_empty()).then(|| Signature {
            name: self.label.to_string(),
            parameters: self.parameters.iter().map(|p| p.to_string()).collect(),
            implicit: false,
        })
    }

    /// Hover text: a q comment line with the signature, then the description.
    pub fn hover_text(&self) -> String {
        format!("/ {}\n{}", self.detail, self.documentation)
    }
}

macro_rules! builtin {
    ($label:literal, $detail:literal, $doc:literal $(, $param:literal)*) => {
        Builtin {
            label: $label,
            detail: $detail,
            documentation: $doc,
            parameters: &[$($param),*],
        }
    };
}

static BUILTINS: Lazy<Vec<Builtin>> = Lazy::new(|| {
    vec![
        builtin!("abs", "abs[x]", "absolute value", "x"),
        builtin!("aj", "aj[c;t1;t2]", "as-of join", "c", "t1", "t2"),
        builtin!("all", "all[x]", "whether all items are non-zero", "x"),
        builtin!("and", "and[x;y]", "lesser of two values, logical AND", "x", "y"),
        builtin!("any", "any[x]", "whether any item is non-zero", "x"),
        builtin!("asc", "asc[x]", "sort ascending", "x"),
        builtin!("asof", "asof[t;d]", "as-of lookup in a table", "t", "d"),
        builtin!("attr", "attr[x]", "attributes of a list", "x"),
        builtin!("avg", "avg[x]", "arithmetic mean", "x"),
        builtin!("avgs", "avgs[x]", "running averages", "x"),
        builtin!("bin", "bin[x;y]", "binary search, last item not greater than y", "x", "y"),
        builtin!("ceiling", "ceiling[x]", "round up to an integer", "x"),
        builtin!("cols", "cols[t]", "column names of a table", "t"),
        builtin!("count", "count[x]", "number of items", "x"),
        builtin!("cross", "cross[x;y]", "cross product", "x", "y"),
        builtin!("cut", "cut[x;y]", "cut a list at indexes or into equal parts", "x", "y"),
        builtin!("delete", "delete c from t where ...", "qSQL delete rows or columns"),
        builtin!("deltas", "deltas[x]", "differences between adjacent items", "x"),
        builtin!("desc", "desc[x]", "sort descending", "x"),
        builtin!("dev", "dev[x]", "standard deviation", "x"),
        builtin!("differ", "differ[x]", "flag items that differ from their predecessor", "x"),
        builtin!("distinct", "distinct[x]", "unique items in order of first occurrence", "x"),
        builtin!("do", "do[n;e1;e2;...]", "evaluate expressions n times", "n", "e1"),
        builtin!("each", "f each x", "apply a function to each item"),
        builtin!("enlist", "enlist[x]", "make a one-item list", "x"),
        builtin!("eval", "eval[x]", "evaluate a parse tree", "x"),
        builtin!("except", "except[x;y]", "items of x not in y", "x", "y"),
        builtin!("exec", "exec c by g from t where ...", "qSQL query returning a dictionary or list"),
        builtin!("exit", "exit[x]", "terminate the process with a status code", "x"),
        builtin!("exp", "exp[x]", "e to the power x", "x"),
        builtin!("fby", "(f;c) fby g", "filter by an aggregate over groups"),
        builtin!("fills", "fills[x]", "replace nulls with the preceding non-null", "x"),
        builtin!("first", "first[x]", "first item", "x"),
        builtin!("flip", "flip[x]", "transpose; dictionary of lists to table", "x"),
        builtin!("floor", "floor[x]", "round down to an integer", "x"),
        builtin!("get", "get[x]", "value of a variable or contents of a file", "x"),
        builtin!("getenv", "getenv[x]", "value of an environment variable", "x"),
        builtin!("group", "group[x]", "dictionary of distinct items to their indexes", "x"),
        builtin!("hcount", "hcount[x]", "size of a file in bytes", "x"),
        builtin!("hdel", "hdel[x]", "delete a file or directory", "x"),
        builtin!("hopen", "hopen[x]", "open a connection or file handle", "x"),
        builtin!("hclose", "hclose[x]", "close a connection or file handle", "x"),
        builtin!("iasc", "iasc[x]", "indexes for an ascending sort", "x"),
        builtin!("idesc", "idesc[x]", "indexes for a descending sort", "x"),
        builtin!("if", "if[c;e1;e2;...]", "evaluate expressions when c is true", "c", "e1"),
        builtin!("ij", "ij[t1;t2]", "inner join", "t1", "t2"),
        builtin!("in", "in[x;y]", "whether x is an item of y", "x", "y"),
        builtin!("insert", "insert[t;r]", "append records to a table", "t", "r"),
        builtin!("inter", "inter[x;y]", "items common to x and y", "x", "y"),
        builtin!("key", "key[x]", "keys of a dictionary or keyed table", "x"),
        builtin!("keys", "keys[t]", "key columns of a keyed table", "t"),
        builtin!("last", "last[x]", "last item", "x"),
        builtin!("like", "like[x;p]", "pattern match", "x", "p"),
        builtin!("lj", "lj[t1;t2]", "left join", "t1", "t2"),
        builtin!("load", "load[x]", "load a binary file into a variable", "x"),
        builtin!("log", "log[x]", "natural logarithm", "x"),
        builtin!("lower", "lower[x]", "lower case", "x"),
        builtin!("ltrim", "ltrim[x]", "remove leading blanks", "x"),
        builtin!("max", "max[x]", "largest item", "x"),
        builtin!("maxs", "maxs[x]", "running maximums", "x"),
        builtin!("med", "med[x]", "median", "x"),
        builtin!("meta", "meta[t]", "column types and attributes of a table", "t"),
        builtin!("min", "min[x]", "smallest item", "x"),
        builtin!("mins", "mins[x]", "running minimums", "x"),
        builtin!("mod", "mod[x;y]", "remainder of x divided by y", "x", "y"),
        builtin!("neg", "neg[x]", "negate", "x"),
        builtin!("next", "next[x]", "each item's successor", "x"),
        builtin!("not", "not[x]", "logical not", "x"),
        builtin!("null", "null[x]", "whether items are null", "x"),
        builtin!("or", "or[x;y]", "greater of two values, logical OR", "x", "y"),
        builtin!("over", "f over x", "reduce; apply f cumulatively and keep the last result"),
        builtin!("peach", "f peach x", "parallel each"),
        builtin!("prd", "prd[x]", "product", "x"),
        builtin!("prev", "prev[x]", "each item's predecessor", "x"),
        builtin!("raze", "raze[x]", "join the items of a list", "x"),
        builtin!("reverse", "reverse[x]", "reverse the order of items", "x"),
        builtin!("rotate", "rotate[n;x]", "rotate a list by n positions", "n", "x"),
        builtin!("rtrim", "rtrim[x]", "remove trailing blanks", "x"),
        builtin!("scan", "f scan x", "apply f cumulatively and keep every result"),
        builtin!("select", "select c by g from t where ...", "qSQL query returning a table"),
        builtin!("set", "set[x;y]", "assign y to the variable or file named by x", "x", "y"),
        builtin!("show", "show[x]", "print a value to the console", "x"),
        builtin!("signum", "signum[x]", "sign of a number", "x"),
        builtin!("sqrt", "sqrt[x]", "square root", "x"),
        builtin!("ssr", "ssr[x;y;z]", "string search and replace", "x", "y", "z"),
        builtin!("string", "string[x]", "cast to string", "x"),
        builtin!("sublist", "sublist[n;x]", "sublist of x by count or range", "n", "x"),
        builtin!("sum", "sum[x]", "total", "x"),
        builtin!("sums", "sums[x]", "running totals", "x"),
        builtin!("sv", "sv[x;y]", "scalar from vector: join strings, decode", "x", "y"),
        builtin!("system", "system[x]", "execute a system command", "x"),
        builtin!("tables", "tables[x]", "names of tables in a namespace", "x"),
        builtin!("til", "til[n]", "first n natural numbers", "n"),
        builtin!("trim", "trim[x]", "remove leading and trailing blanks", "x"),
        builtin!("type", "type[x]", "datatype of a value", "x"),
        builtin!("uj", "uj[t1;t2]", "union join", "t1", "t2"),
        builtin!("ungroup", "ungroup[t]", "flatten a table with list columns", "t"),
        builtin!("union", "union[x;y]", "distinct items of x and y", "x", "y"),
        builtin!("update", "update c by g from t where ...", "qSQL update or add columns"),
        builtin!("upper", "upper[x]", "upper case", "x"),
        builtin!("upsert", "upsert[t;r]", "overwrite or append records", "t", "r"),
        builtin!("value", "value[x]", "value of a dictionary, variable or string expression", "x"),
        builtin!("var", "var[x]", "variance", "x"),
        builtin!("view", "view[x]", "definition of a view", "x"),
        builtin!("vs", "vs[x;y]", "vector from scalar: split strings, encode", "x", "y"),
        builtin!("wavg", "wavg[w;x]", "weighted average", "w", "x"),
        builtin!("where", "where[x]", "indexes of true items, or replicate", "x"),
        builtin!("while", "while[c;e1;e2;...]", "evaluate expressions while c is true", "c", "e1"),
        builtin!("within", "within[x;r]", "whether x lies within the range r", "x", "r"),
        builtin!("wj", "wj[w;c;t;(q;(f;c)...)]", "window join", "w", "c", "t", "aggs"),
        builtin!("wsum", "wsum[w;x]", "weighted sum", "w", "x"),
        builtin!("xasc", "xasc[c;t]", "sort a table ascending by columns", "c", "t"),
        builtin!("xbar", "xbar[x;y]", "round y down to a multiple of x", "x", "y"),
        builtin!("xcol", "xcol[c;t]", "rename table columns", "c", "t"),
        builtin!("xcols", "xcols[c;t]", "reorder table columns", "c", "t"),
        builtin!("xdesc", "xdesc[c;t]", "sort a table descending by columns", "c", "t"),
        builtin!("xexp", "xexp[x;y]", "x to the power y", "x", "y"),
        builtin!("xgroup", "xgroup[c;t]", "group a table by columns", "c", "t"),
        builtin!("xkey", "xkey[c;t]", "set the key columns of a table", "c", "t"),
        builtin!("xlog", "xlog[x;y]", "base-x logarithm of y", "x", "y"),
        builtin!("xprev", "xprev[n;x]", "items n positions earlier", "n", "x"),
        builtin!(".z.p", ".z.p", "current local timestamp (UTC)"),
        builtin!(".z.P", ".z.P", "current local timestamp"),
        builtin!(".z.d", ".z.d", "current date (UTC)"),
        builtin!(".z.t", ".z.t", "current time (UTC)"),
        builtin!(".z.h", ".z.h", "host name"),
        builtin!(".z.u", ".z.u", "user name of the current connection"),
        builtin!(".z.w", ".z.w", "handle of the current connection"),
        builtin!(".z.x", ".z.x", "command-line arguments"),
        builtin!(".z.pg", ".z.pg:{[x] ...}", "synchronous message handler", "x"),
        builtin!(".z.ps", ".z.ps:{[x] ...}", "asynchronous message handler", "x"),
        builtin!(".z.po", ".z.po:{[h] ...}", "connection open handler", "h"),
        builtin!(".z.pc", ".z.pc:{[h] ...}", "connection close handler", "h"),
        builtin!(".z.ts", ".z.ts:{[t] ...}", "timer handler", "t"),
        builtin!(".Q.gc", ".Q.gc[]", "garbage collect"),
        builtin!(".Q.w", ".Q.w[]", "memory statistics"),
        builtin!(".Q.s", ".Q.s[x]", "plain-text rendering of a value", "x"),
        builtin!(".Q.fmt", ".Q.fmt[w;d;x]", "format a number to width and decimals", "w", "d", "x"),
        builtin!(".Q.en", ".Q.en[d;t]", "enumerate symbol columns against a sym file", "d", "t"),
        builtin!(".Q.dpft", ".Q.dpft[d;p;f;t]", "save a table splayed to a partition", "d", "p", "f", "t"),
        builtin!(".Q.chk", ".Q.chk[x]", "fill missing tables in a partitioned database", "x"),
        builtin!(".Q.hdpf", ".Q.hdpf[h;d;p;f]", "save tables and notify a historical process", "h", "d", "p", "f"),
        builtin!(".h.tx", ".h.tx", "dictionary of file-type renderers"),
        builtin!(".j.j", ".j.j[x]", "serialize to JSON", "x"),
        builtin!(".j.k", ".j.k[x]", "deserialize JSON", "x"),
    ]
});

pub fn builtins() -> &'static [Builtin] {
    BUILTINS.as_slice()
}

pub fn find(label: &str) -> Option<&'static Builtin> {
    builtins().iter().find(|b| b.label == label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_unique() {
        let mut labels: Vec<&str> = builtins().iter().map(|b| b.label).collect();
        let total = labels.len();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), total);
    }

    #[test]
    fn hover_and_signature() {
        let ssr = find("ssr").unwrap();
        assert_eq!(ssr.hover_text(), "/ ssr[x;y;z]\nstring search and replace");
        assert_eq!(ssr.signature().unwrap().label(), "ssr[x;y;z]");
        assert!(find("select").unwrap().signature().is_none());
        assert!(find(".z.p").unwrap().is_global());
    }
}
