//! Distributed key-value store challenge

use lsfr_attest::{is, is_null, matches, StopSignal, Suite};

use crate::{Challenge, Stage};

pub(crate) fn challenge() -> Challenge {
    Challenge {
        key: "key-value-store",
        name: "Distributed Key-Value Store",
        summary: "Build a distributed key-value database from scratch. You'll start with \
                  a simple HTTP API and progressively add persistence and crash recovery.",
        concepts: &["Storage Engines", "Write-Ahead Logs", "Crash Recovery", "Fault Tolerance"],
        stages: vec![
            Stage { key: "http-api", name: "Basic GET/PUT/DELETE operations", suite: http_api },
            Stage { key: "persistence", name: "Data survives restarts", suite: persistence },
            Stage { key: "crash-recovery", name: "Data survives crashes", suite: crash_recovery },
        ],
    }
}

fn persisted_data() -> Vec<(String, String)> {
    vec![
        ("persistent:key1".into(), "value1".into()),
        ("persistent:key2".into(), "value with spaces".into()),
        ("persistent:key3".into(), "🌍 unicode value".into()),
        ("persistent:key4".into(), "long_value_".repeat(50)),
    ]
}

fn http_api() -> Suite {
    Suite::new()
        .setup(|h| async move {
            h.start("primary", &[]).await?;

            // Clear key-value store
            h.http("primary", "DELETE", "/clear")
                .status(is(200u16))
                .assert(
                    "Your server should implement a /clear endpoint.\n\
                     Add a DELETE /clear method that deletes all key-value pairs.",
                )
                .await
        })
        .test("PUT Basic Operations", |h| async move {
            // Set initial key-value pairs that subsequent tests rely on
            let capitals =
                [("kenya", "Nairobi"), ("uganda", "Kampala"), ("tanzania", "Dar es Salaam")];
            for (country, capital) in capitals {
                h.http("primary", "PUT", &format!("/kv/{country}:capital"))
                    .with_body(capital)
                    .status(is(200u16))
                    .assert(
                        "Your server should accept PUT requests and return 200 OK.\n\
                         Ensure your HTTP handler processes PUT requests to /kv/{key}.",
                    )
                    .await?;
            }

            h.http("primary", "PUT", "/kv/tanzania:capital")
                .with_body("Dodoma")
                .status(is(200u16))
                .assert(
                    "Your server should allow overwriting existing keys.\n\
                     Ensure PUT requests update the value of existing keys.",
                )
                .await?;

            h.http("primary", "GET", "/kv/tanzania:capital")
                .status(is(200u16))
                .body(is("Dodoma"))
                .assert(
                    "Your server should return the updated value after overwrite.\n\
                     Ensure GET requests return the most recently stored value.",
                )
                .await
        })
        .test("PUT Edge and Error Cases", |h| async move {
            h.http("primary", "PUT", "/kv/empty")
                .status(is(400u16))
                .body(is("value cannot be empty\n"))
                .assert(
                    "Your server accepted an empty value when it should reject it.\n\
                     Add validation to return 400 Bad Request for empty values.",
                )
                .await?;

            h.http("primary", "PUT", "/kv/")
                .with_body("some_value")
                .status(is(400u16))
                .body(is("key cannot be empty\n"))
                .assert(
                    "Your server accepted an empty key when it should reject it.\n\
                     Add validation to return 400 Bad Request for empty keys.",
                )
                .await?;

            h.http("primary", "PUT", "/kv/unicode:key")
                .with_body("🌍 Nairobi")
                .status(is(200u16))
                .assert(
                    "Your server should handle Unicode characters in values.\n\
                     Ensure your HTTP handler properly processes UTF-8 encoded data.",
                )
                .await?;

            let long_key = format!("long:{}", "k".repeat(100));
            let long_value = "v".repeat(10_000);
            h.http("primary", "PUT", &format!("/kv/{long_key}"))
                .with_body(long_value)
                .status(is(200u16))
                .assert(
                    "Your server should handle long keys and values.\n\
                     Ensure your server doesn't have arbitrary key & value length limits.",
                )
                .await?;

            h.http("primary", "PUT", "/kv/special:key-with_symbols.123")
                .with_body("value with spaces & symbols! \t")
                .status(is(200u16))
                .assert(
                    "Your server should handle special characters in keys and values.\n\
                     Ensure proper URL path parsing and value encoding/decoding.",
                )
                .await
        })
        .test("GET Basic Operations", |h| async move {
            let stored =
                [("kenya:capital", "Nairobi"), ("uganda:capital", "Kampala")];
            for (key, value) in stored {
                h.http("primary", "GET", &format!("/kv/{key}"))
                    .status(is(200u16))
                    .body(is(value))
                    .assert(
                        "Your server should return stored values with GET requests.\n\
                         Ensure your key-value storage and retrieval logic is working correctly.",
                    )
                    .await?;
            }

            h.http("primary", "GET", "/kv/unicode:key")
                .status(is(200u16))
                .body(is("🌍 Nairobi"))
                .assert(
                    "Your server should preserve Unicode characters in stored values.\n\
                     Ensure proper UTF-8 handling in your storage and retrieval logic.",
                )
                .await?;

            let long_key = format!("long:{}", "k".repeat(100));
            let long_value = "v".repeat(10_000);
            h.http("primary", "GET", &format!("/kv/{long_key}"))
                .status(is(200u16))
                .body(is(long_value))
                .assert(
                    "Your server should handle retrieval of long keys and values.\n\
                     Ensure your storage doesn't truncate or corrupt large data.",
                )
                .await
        })
        .test("GET Edge and Error Cases", |h| async move {
            h.http("primary", "GET", "/kv/nonexistent:key")
                .status(is(404u16))
                .body(is("key not found\n"))
                .assert(
                    "Your server should return 404 Not Found when a key doesn't exist.\n\
                     Check your key lookup logic and error handling.",
                )
                .await?;

            // Keys are case sensitive
            h.http("primary", "GET", "/kv/KENYA:CAPITAL")
                .status(is(404u16))
                .body(is("key not found\n"))
                .assert(
                    "Your server should treat keys as case sensitive.\n\
                     KENYA:CAPITAL is a different key from kenya:capital.",
                )
                .await?;

            h.http("primary", "GET", "/kv/")
                .status(is(400u16))
                .body(is("key cannot be empty\n"))
                .assert(
                    "Your server should reject requests with an empty key.\n\
                     Add validation to return 400 Bad Request for empty keys.",
                )
                .await
        })
        .test("DELETE Basic Operations", |h| async move {
            h.http("primary", "DELETE", "/kv/tanzania:capital")
                .status(is(200u16))
                .assert(
                    "Your server should accept DELETE requests.\n\
                     Ensure your HTTP handler processes DELETE requests correctly.",
                )
                .await?;

            h.http("primary", "GET", "/kv/tanzania:capital")
                .status(is(404u16))
                .body(is("key not found\n"))
                .assert(
                    "Your server should actually remove deleted keys.\n\
                     GET requests for deleted keys must return 404 Not Found.",
                )
                .await?;

            h.http("primary", "GET", "/kv/kenya:capital")
                .status(is(200u16))
                .body(is("Nairobi"))
                .assert(
                    "Your server deleted more than the requested key.\n\
                     DELETE must only remove the key named in the request.",
                )
                .await
        })
        .test("DELETE Edge and Error Cases", |h| async move {
            // Deleting a missing key is idempotent
            h.http("primary", "DELETE", "/kv/nonexistent:key")
                .status(is(200u16))
                .assert(
                    "Your server should treat DELETE as idempotent.\n\
                     Deleting a non-existent key should still return 200 OK.",
                )
                .await?;

            h.http("primary", "PUT", "/kv/delete:twice")
                .with_body("value")
                .status(is(200u16))
                .assert("Your server should accept PUT requests.")
                .await?;
            h.http("primary", "DELETE", "/kv/delete:twice")
                .status(is(200u16))
                .assert("Your server should accept DELETE requests.")
                .await?;
            h.http("primary", "DELETE", "/kv/delete:twice")
                .status(is(200u16))
                .assert(
                    "Your server should treat DELETE as idempotent.\n\
                     Deleting the same key twice should still return 200 OK.",
                )
                .await?;

            h.http("primary", "DELETE", "/kv/")
                .status(is(400u16))
                .body(is("key cannot be empty\n"))
                .assert(
                    "Your server should reject requests with an empty key.\n\
                     Add validation to return 400 Bad Request for empty keys.",
                )
                .await
        })
        .test("Concurrent Operations", |h| async move {
            let writes = [
                ("concurrent:key1", "value1"),
                ("concurrent:key2", "value2"),
                ("concurrent:key3", "value3"),
            ];

            h.concurrently(writes.map(|(key, value)| {
                let h = h.clone();
                async move {
                    h.http("primary", "PUT", &format!("/kv/{key}"))
                        .with_body(value)
                        .status(is(200u16))
                        .assert(
                            "Your server should handle concurrent PUT requests.\n\
                             Ensure thread-safety in your storage implementation.",
                        )
                        .await
                }
            }))
            .await?;

            for (key, value) in writes {
                h.http("primary", "GET", &format!("/kv/{key}"))
                    .status(is(200u16))
                    .body(is(value))
                    .assert(
                        "Your server lost a concurrent write.\n\
                         Ensure concurrent PUT requests don't overwrite each other's keys.",
                    )
                    .await?;
            }

            Ok(())
        })
        .test("Check Allowed HTTP Methods", |h| async move {
            for method in ["POST", "PATCH"] {
                h.http("primary", method, "/kv/test:key")
                    .status(is(405u16))
                    .body(is("method not allowed\n"))
                    .assert(
                        "Your server should only allow GET, PUT, and DELETE on /kv/{key}.\n\
                         Return 405 Method Not Allowed for anything else.",
                    )
                    .await?;
            }

            Ok(())
        })
}

fn persistence() -> Suite {
    Suite::new()
        .setup(|h| async move {
            h.start("primary", &[]).await?;

            h.http("primary", "DELETE", "/clear")
                .status(is(200u16))
                .assert(
                    "Your server should implement a /clear endpoint.\n\
                     Add a DELETE /clear method that deletes all key-value pairs.",
                )
                .await
        })
        .test("Basic Persistence Setup", |h| async move {
            for (key, value) in persisted_data() {
                h.http("primary", "PUT", &format!("/kv/{key}"))
                    .with_body(value)
                    .status(is(200u16))
                    .assert(
                        "Your server should accept PUT requests and store data.\n\
                         Ensure your HTTP handler processes PUT requests correctly.",
                    )
                    .await?;
            }

            for (key, value) in persisted_data() {
                h.http("primary", "GET", &format!("/kv/{key}"))
                    .status(is(200u16))
                    .body(is(value))
                    .assert(
                        "Your server should return stored values before the persistence test.\n\
                         Ensure basic storage functionality works correctly.",
                    )
                    .await?;
            }

            Ok(())
        })
        .test("Clean Shutdown Persistence", |h| async move {
            h.restart("primary").await?;

            for (key, value) in persisted_data() {
                h.http("primary", "GET", &format!("/kv/{key}"))
                    .status(is(200u16))
                    .body(is(value))
                    .assert(
                        "Your server should persist data across clean shutdowns.\n\
                         Implement data persistence to disk (file-based storage, database, etc.).\n\
                         Ensure data is written to persistent storage on PUT operations.",
                    )
                    .await?;
            }

            Ok(())
        })
        .test("SIGTERM Signal Handling", |h| async move {
            let fresh = [
                ("sigterm:key1", "sigterm_value1"),
                ("sigterm:key2", "data before signal"),
                ("sigterm:key3", "critical business data"),
            ];

            for (key, value) in fresh {
                h.http("primary", "PUT", &format!("/kv/{key}"))
                    .with_body(value)
                    .status(is(200u16))
                    .assert(
                        "Your server should store new data for the SIGTERM test.\n\
                         Ensure PUT operations work correctly.",
                    )
                    .await?;
            }

            // Simulates a production shutdown
            h.restart("primary").await?;

            for (key, value) in fresh {
                h.http("primary", "GET", &format!("/kv/{key}"))
                    .status(is(200u16))
                    .body(is(value))
                    .assert(
                        "Your server should persist all data when handling SIGTERM.\n\
                         Implement proper signal handling with graceful shutdown.\n\
                         Ensure data is flushed to disk before process termination.",
                    )
                    .await?;
            }

            Ok(())
        })
        .test("Data Integrity After Multiple Restarts", |h| async move {
            for cycle in 1..=3 {
                let key = format!("cycle:restart_{cycle}");
                let value = format!("restart_data_{cycle}");

                h.http("primary", "PUT", &format!("/kv/{key}"))
                    .with_body(value.clone())
                    .status(is(200u16))
                    .assert(
                        "Your server should store data for the integrity test cycle.\n\
                         Ensure PUT operations work correctly during multiple restart cycles.",
                    )
                    .await?;

                h.restart("primary").await?;

                h.http("primary", "GET", &format!("/kv/{key}"))
                    .status(is(200u16))
                    .body(is(value))
                    .assert(
                        "Your server should maintain data integrity across multiple restarts.\n\
                         Ensure persistent storage remains consistent and uncorrupted.",
                    )
                    .await?;
            }

            // All historical data must still be there
            for (key, value) in persisted_data() {
                h.http("primary", "GET", &format!("/kv/{key}"))
                    .status(is(200u16))
                    .body(is(value))
                    .assert(
                        "Your server should preserve all historical data across restarts.\n\
                         Ensure no data corruption or loss occurs during persistence operations.",
                    )
                    .await?;
            }

            Ok(())
        })
        .test("Persistence Under Load", |h| async move {
            h.concurrently((1..=8).map(|i| {
                let h = h.clone();
                async move {
                    h.http("primary", "PUT", &format!("/kv/load:concurrent{i}"))
                        .with_body(format!("load_value{i}"))
                        .status(is(200u16))
                        .assert(
                            "Your server should handle concurrent PUT requests under load.\n\
                             Ensure persistence works correctly during high-traffic scenarios.",
                        )
                        .await
                }
            }))
            .await?;

            // Restart immediately after the concurrent burst
            h.restart("primary").await?;

            for i in 1..=8 {
                h.http("primary", "GET", &format!("/kv/load:concurrent{i}"))
                    .status(is(200u16))
                    .body(is(format!("load_value{i}")))
                    .assert(
                        "Your server should persist all concurrent writes correctly.\n\
                         Ensure thread-safe persistence and no data loss under load.",
                    )
                    .await?;
            }

            Ok(())
        })
        .test("Empty Store Persistence", |h| async move {
            h.http("primary", "DELETE", "/clear")
                .status(is(200u16))
                .assert(
                    "Your server should implement a /clear endpoint.\n\
                     Add a DELETE /clear method that deletes all key-value pairs.",
                )
                .await?;

            h.http("primary", "GET", "/kv/any:key")
                .status(is(404u16))
                .body(is("key not found\n"))
                .assert(
                    "Your server should return 404 for non-existent keys after clear.\n\
                     Ensure the /clear endpoint removes all data.",
                )
                .await?;

            h.restart("primary").await?;

            h.http("primary", "GET", "/kv/any:key")
                .status(is(404u16))
                .body(is("key not found\n"))
                .assert(
                    "Your server should handle empty store persistence correctly.\n\
                     Ensure the persistence layer handles empty state gracefully.",
                )
                .await?;

            h.http("primary", "PUT", "/kv/after:empty")
                .with_body("new_data")
                .status(is(200u16))
                .assert(
                    "Your server should accept new data after an empty state restart.\n\
                     Ensure the persistence layer reinitializes correctly.",
                )
                .await?;

            h.restart("primary").await?;

            h.http("primary", "GET", "/kv/after:empty")
                .status(is(200u16))
                .body(is("new_data"))
                .assert(
                    "Your server should persist data added after an empty state restart.\n\
                     Ensure persistence works correctly in all scenarios.",
                )
                .await
        })
}

fn crash_recovery() -> Suite {
    Suite::new()
        .setup(|h| async move { h.start("primary", &[]).await })
        .test("Basic WAL Durability", |h| async move {
            h.http("primary", "PUT", "/kv/wal:basic")
                .with_body("initial")
                .status(is(200u16))
                .assert(
                    "Your server should accept PUT requests.\n\
                     Ensure your HTTP handler processes PUT requests correctly.",
                )
                .await?;

            h.http("primary", "PUT", "/kv/wal:updated")
                .with_body("v1")
                .status(is(200u16))
                .assert(
                    "Your server should accept PUT requests.\n\
                     Ensure your HTTP handler processes PUT requests correctly.",
                )
                .await?;

            h.http("primary", "PUT", "/kv/wal:updated")
                .with_body("v2")
                .status(is(200u16))
                .assert(
                    "Your server should allow overwriting existing keys.\n\
                     Ensure PUT requests update the value of existing keys.",
                )
                .await?;

            h.http("primary", "PUT", "/kv/wal:deleted")
                .with_body("temporary")
                .status(is(200u16))
                .assert("Your server should accept PUT requests.")
                .await?;

            h.http("primary", "DELETE", "/kv/wal:deleted")
                .status(is(200u16))
                .assert("Your server should accept DELETE requests.")
                .await?;

            // Crash without warning
            h.restart_with("primary", StopSignal::Kill).await?;

            h.http("primary", "GET", "/kv/wal:basic")
                .status(is(200u16))
                .body(is("initial"))
                .assert(
                    "Your server acknowledged the PUT but lost the data after crashing.\n\
                     Write operations to a WAL and fsync before acknowledging them.",
                )
                .await?;

            h.http("primary", "GET", "/kv/wal:updated")
                .status(is(200u16))
                .body(is("v2"))
                .assert(
                    "Your server recovered a stale value after crashing.\n\
                     Replay the WAL in order so the latest write wins.",
                )
                .await?;

            h.http("primary", "GET", "/kv/wal:deleted")
                .status(is(404u16))
                .body(is("key not found\n"))
                .assert(
                    "Your server resurrected a deleted key after crashing.\n\
                     Log DELETE operations to the WAL too, not just PUTs.",
                )
                .await
        })
        .test("Repeated Crash Cycles", |h| async move {
            for cycle in 1..=3 {
                let key = format!("crash:cycle_{cycle}");
                let value = format!("crash_data_{cycle}");

                h.http("primary", "PUT", &format!("/kv/{key}"))
                    .with_body(value.clone())
                    .status(is(200u16))
                    .assert("Your server should accept PUT requests between crashes.")
                    .await?;

                h.restart_with("primary", StopSignal::Kill).await?;

                h.http("primary", "GET", &format!("/kv/{key}"))
                    .status(is(200u16))
                    .body(is(value))
                    .assert(
                        "Your server should recover acknowledged writes after every crash.\n\
                         Ensure WAL replay works repeatedly, not just once.",
                    )
                    .await?;
            }

            Ok(())
        })
        .test("Recovery Under Concurrent Load", |h| async move {
            h.concurrently((1..=100).map(|i| {
                let h = h.clone();
                async move {
                    h.http("primary", "PUT", &format!("/kv/large:key{i}"))
                        .with_body("x".repeat(100))
                        .status(is(200u16))
                        .assert(
                            "Your server should handle concurrent PUT requests.\n\
                             Ensure thread-safety in your storage implementation.",
                        )
                        .await
                }
            }))
            .await?;

            // Crash immediately after the concurrent writes
            h.restart_with("primary", StopSignal::Kill).await?;

            for i in 1..=100 {
                h.http("primary", "GET", &format!("/kv/large:key{i}"))
                    .status(is(200u16))
                    .body(is("x".repeat(100)))
                    .assert(
                        "Your server should preserve all acknowledged writes after a crash.\n\
                         Ensure WAL writes are thread-safe and durably stored before acknowledging.\n\
                         If recovery is slow, consider checkpointing to reduce replay time.",
                    )
                    .await?;
            }

            Ok(())
        })
        .test("Cluster Info Shape", |h| async move {
            // Single node only; multi-node behaviour belongs to later stages.
            h.http("primary", "GET", "/cluster/info")
                .status(is(200u16))
                .json("role", is("leader"))
                .json("leader", is_null())
                .json("term", matches("^[0-9]+$"))
                .assert(
                    "Your server should expose cluster state at GET /cluster/info.\n\
                     A standalone node reports role \"leader\", a null leader field\n\
                     (there is no other node to redirect to), and a numeric term.",
                )
                .await?;

            h.restart_with("primary", StopSignal::Kill).await?;

            h.http("primary", "GET", "/cluster/info")
                .status(is(200u16))
                .json("role", is("leader"))
                .json("term", matches("^[0-9]+$"))
                .assert(
                    "Your server should still report cluster state after a crash.\n\
                     Persist the term alongside your data so recovery does not reset it.",
                )
                .await
        })
}
