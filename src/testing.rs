//! Ruleset fixtures shared by unit tests.

/// Two-condition rule on `arg1`/`arg2` plus a schema processor for `arg2`.
pub const WAF_RULE: &str = r#"{
    "version": "2.1",
    "metadata": {"rules_version": "1.2.3"},
    "rules": [{
        "id": "1",
        "name": "rule1",
        "tags": {"type": "flow1", "category": "category1"},
        "conditions": [
            {"operator": "match_regex", "parameters": {"inputs": [{"address": "arg1", "key_path": []}], "regex": "^string.*"}},
            {"operator": "match_regex", "parameters": {"inputs": [{"address": "arg2", "key_path": []}], "regex": ".*"}}
        ]
    }],
    "processors": [{
        "id": "processor-001",
        "generator": "extract_schema",
        "parameters": {
            "mappings": [{"inputs": [{"address": "arg2"}], "output": "_dd.appsec.s.arg2"}],
            "scanners": [{"tags": {"category": "pii"}}]
        },
        "evaluate": false,
        "output": true
    }],
    "scanners": []
}"#;

/// IP block rule reading the `blocked_ips` data set.
pub const WAF_RULE_WITH_DATA: &str = r#"{
    "version": "2.1",
    "rules": [{
        "id": "blk-001-001",
        "name": "Block IP Addresses",
        "tags": {"type": "block_ip", "category": "security_response"},
        "conditions": [{
            "parameters": {"inputs": [{"address": "http.client_ip"}], "data": "blocked_ips"},
            "operator": "ip_match"
        }],
        "transformers": [],
        "on_match": ["block"]
    }]
}"#;

/// Scanner rule on request headers plus the four fingerprint processors.
pub const RULES_OK: &str = r#"{
    "version": "2.2",
    "metadata": {"rules_version": "1.2.3"},
    "rules": [{
        "id": "ua0-600-12x",
        "name": "Arachni",
        "tags": {"type": "security_scanner", "category": "attack_attempt"},
        "conditions": [{
            "operator": "phrase_match",
            "parameters": {
                "inputs": [{"address": "server.request.headers.no_cookies"}],
                "list": ["acunetix-product"]
            }
        }],
        "transformers": ["lowercase"]
    }],
    "processors": [
        {
            "id": "http-endpoint-fingerprint",
            "generator": "http_endpoint_fingerprint",
            "parameters": {"mappings": [{
                "method": [{"address": "server.request.method"}],
                "uri_raw": [{"address": "server.request.uri.raw"}],
                "body": [{"address": "server.request.body"}],
                "query": [{"address": "server.request.query"}],
                "output": "_dd.appsec.fp.http.endpoint"
            }]},
            "evaluate": false,
            "output": true
        },
        {
            "id": "http-header-fingerprint",
            "generator": "http_header_fingerprint",
            "parameters": {"mappings": [{
                "headers": [{"address": "server.request.headers.no_cookies"}],
                "output": "_dd.appsec.fp.http.header"
            }]},
            "evaluate": false,
            "output": true
        },
        {
            "id": "http-network-fingerprint",
            "generator": "http_network_fingerprint",
            "parameters": {"mappings": [{
                "headers": [{"address": "server.request.headers.no_cookies"}],
                "output": "_dd.appsec.fp.http.network"
            }]},
            "evaluate": false,
            "output": true
        },
        {
            "id": "session-fingerprint",
            "generator": "session_fingerprint",
            "parameters": {"mappings": [{
                "cookies": [{"address": "server.request.cookies"}],
                "session_id": [{"address": "usr.session_id"}],
                "user_id": [{"address": "usr.id"}],
                "output": "_dd.appsec.fp.session"
            }]},
            "evaluate": false,
            "output": true
        }
    ]
}"#;

/// One valid rule and four broken ones sharing three distinct errors.
pub const RULES_INVALID: &str = r#"{
    "version": "2.2",
    "rules": [
        {
            "id": "ok-1",
            "name": "valid",
            "tags": {"type": "flow1", "category": "category1"},
            "conditions": [{"operator": "match_regex", "parameters": {"inputs": [{"address": "arg1"}], "regex": "^string.*"}}]
        },
        {
            "id": "bad-1",
            "name": "no type",
            "tags": {"category": "category1"},
            "conditions": [{"operator": "match_regex", "parameters": {"inputs": [{"address": "arg1"}], "regex": "x"}}]
        },
        {
            "id": "bad-2",
            "name": "no type either",
            "tags": {},
            "conditions": [{"operator": "match_regex", "parameters": {"inputs": [{"address": "arg1"}], "regex": "x"}}]
        },
        {
            "id": "bad-3",
            "name": "squash",
            "tags": {"type": "flow1"},
            "conditions": [{"operator": "squash", "parameters": {"inputs": [{"address": "arg1"}]}}]
        },
        {
            "id": "bad-4",
            "name": "no inputs",
            "tags": {"type": "flow1"},
            "conditions": [{"operator": "match_regex", "parameters": {"regex": "x"}}]
        }
    ]
}"#;
